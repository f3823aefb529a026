use clap::{ArgAction, Parser};

pub fn default_threads() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if cores > 4 { (cores / 2).min(16) } else { cores.max(1) }
}

fn parse_seconds(input: &str) -> Result<f64, String> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds: {input:?}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!(
            "seconds must be finite and non-negative: {input:?}"
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "upcheck",
    version,
    about = "Concurrent HTTP(S) endpoint availability verifier"
)]
pub struct Cli {
    /// Endpoint URL(s) to verify; `http://` is assumed when the scheme is omitted.
    #[arg(value_name = "ENDPOINT_URL")]
    pub endpoint_url: Vec<String>,

    /// Number of concurrent workers.
    #[arg(
        short = 'T',
        long,
        default_value_t = default_threads(),
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub threads: usize,

    /// Number of repetitions per task.
    #[arg(
        short = 'n',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub amount: u64,

    /// Seconds a worker waits before each request it makes.
    #[arg(short = 'd', long, default_value_t = 0.0, value_parser = parse_seconds)]
    pub delay: f64,

    /// Total request timeout in seconds, split between connect and read.
    #[arg(short = 't', long, default_value_t = 10.0, value_parser = parse_seconds)]
    pub timeout: f64,

    /// Skip TLS certificate verification.
    #[arg(short = 'i', long)]
    pub insecure: bool,

    /// Read requests from a file (`-` for standard input); repeatable.
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Vec<String>,

    /// Exit with code 1 if any request failed.
    #[arg(short = 'x', long)]
    pub exit_code: bool,

    /// Force colored output on.
    #[arg(short = 'c', long = "color", overrides_with = "no_color")]
    pub color: bool,

    /// Force colored output off.
    #[arg(short = 'C', long = "no-color", overrides_with = "color")]
    pub no_color: bool,

    /// Print the sequential request id in each result row.
    #[arg(long)]
    pub show_id: bool,

    /// Append the transport error message to failed result rows.
    #[arg(long)]
    pub show_error: bool,

    /// Increase diagnostic verbosity (up to -vvv).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Tri-state color resolution: `Some(true)` forced on, `Some(false)`
    /// forced off, `None` decided by the output stream.
    pub fn color_mode(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }
}
