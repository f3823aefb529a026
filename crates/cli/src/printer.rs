use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::Command;
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Attribute, Color, StyledContent, Stylize};

use upcheck_engine::{RequestOutcome, SharedState};

use crate::format::{digit_width, format_seconds, format_size};

const COLUMN_PAD: &str = "  ";
const CW_STATUS: usize = 4;
const CW_SIZE: usize = 7;
const CW_ELAPSED: usize = 7;
const CW_LABEL: usize = 12;
const CW_TOTAL: usize = 6;
const SEPARATOR_WIDTH: usize = 25;

/// Presentation switches resolved from the CLI options and the stream kind.
#[derive(Debug, Clone, Copy)]
pub struct PrinterOptions {
    /// Emit ANSI SGR styling.
    pub color: bool,
    /// Draw the in-place progress footer (primary stream is a terminal).
    pub footer: bool,
    /// Print the sequential request id column.
    pub show_id: bool,
    /// Append the transport error message to failed rows.
    pub show_error: bool,
}

/// Serialized renderer for the primary stream.
///
/// All output funnels through the single owner of this struct, so result rows
/// never interleave; on a terminal a one-line progress footer is re-drawn in
/// place after every row. A write error (broken pipe) latches the printer into
/// discard mode and the run completes silently.
pub struct Printer {
    out: io::Stdout,
    opts: PrinterOptions,
    state: Arc<SharedState>,
    method_width: usize,
    id_width: usize,
    broken: bool,
}

impl Printer {
    /// Build a printer over the fully seeded shared state; the id column and
    /// the method column are sized from the totals known at this point.
    pub fn new(opts: PrinterOptions, state: Arc<SharedState>) -> Self {
        let method_width = state.method_width();
        let id_width = digit_width(state.total());
        Self {
            out: io::stdout(),
            opts,
            state,
            method_width,
            id_width,
            broken: false,
        }
    }

    /// Thread/request header, separator and the initial (empty) footer.
    pub fn print_prologue(&mut self, threads: usize) {
        let total = self.state.total();
        let threads = self.styled(format!("{threads:>CW_TOTAL$}"), None, &[Attribute::Bold]);
        self.line(format!("{COLUMN_PAD}{:<CW_LABEL$}{threads}", "Threads:"));
        let total_text = self.styled(format!("{total:>CW_TOTAL$}"), None, &[Attribute::Bold]);
        self.line(format!("{COLUMN_PAD}{:<CW_LABEL$}{total_text}", "Requests:"));
        self.separator();
        self.footer(0);
    }

    /// One result row plus a refreshed footer. Pairs the row with the printed
    /// counter so the footer value is consistent with what is on screen.
    pub fn print_finished(&mut self, outcome: &RequestOutcome) {
        let row = self.render_row(outcome);
        self.line(row);
        let printed = self.state.next_printed();
        self.footer(printed);
    }

    /// Warning line shown when the first termination signal arrives.
    pub fn print_shutdown_warning(&mut self) {
        let warning = self.styled(
            "Shutting threads down (Ctrl+C again to force)".to_string(),
            Some(Color::Yellow),
            &[],
        );
        self.line(warning);
        self.footer(self.state.printed());
    }

    /// Aggregate verdict: result, success ratio, median latency, wall time.
    pub fn print_epilogue(&mut self, wall: Duration) {
        let total = self.state.total();
        let success = self.state.success();
        let all_ok = success == total;

        self.separator();

        let verdict = if all_ok {
            self.styled(
                "PASS".to_string(),
                Some(Color::Green),
                &[Attribute::Bold, Attribute::Reverse],
            )
        } else {
            self.styled(
                "FAIL".to_string(),
                Some(Color::Red),
                &[Attribute::Bold, Attribute::Reverse],
            )
        };
        self.line(format!("{COLUMN_PAD}{:<CW_LABEL$}{verdict}", "Result:"));

        let ratio = format!("{success}/{total}");
        let ratio = if all_ok {
            self.styled(
                format!("{ratio:>CW_TOTAL$}"),
                Some(Color::Green),
                &[Attribute::Bold],
            )
        } else {
            format!("{ratio:>CW_TOTAL$}")
        };
        let percent = if total > 0 {
            100.0 * success as f64 / total as f64
        } else {
            0.0
        };
        self.line(format!(
            "{COLUMN_PAD}{:<CW_LABEL$}{ratio}  ({percent:.1}%)",
            "Successful:"
        ));

        let median = match self.state.latency_median() {
            Some(seconds) => format!("{:>CW_TOTAL$}", format_seconds(seconds)),
            None => self.styled(
                format!("{:>CW_TOTAL$}", "---"),
                Some(Color::DarkGrey),
                &[],
            ),
        };
        self.line(format!("{COLUMN_PAD}{:<CW_LABEL$}{median}", "Avg (p50):"));

        self.line(format!(
            "{COLUMN_PAD}{:<CW_LABEL$}{:>CW_TOTAL$}",
            "Total time:",
            format_seconds(wall.as_secs_f64())
        ));
    }

    fn render_row(&self, outcome: &RequestOutcome) -> String {
        let mut columns: Vec<String> = Vec::with_capacity(4);

        if let Some(error) = &outcome.error {
            // The error class spans the status and size columns.
            let width = CW_STATUS + COLUMN_PAD.len() + CW_SIZE;
            columns.push(self.styled(
                format!("{:>width$}", error.kind),
                Some(Color::Red),
                &[Attribute::Bold],
            ));
        } else {
            let code = outcome
                .status
                .map(|status| status.as_u16().to_string())
                .unwrap_or_else(|| "---".to_string());
            let color = if outcome.ok { Color::Green } else { Color::Red };
            columns.push(self.styled(
                format!("{code:>CW_STATUS$}"),
                Some(color),
                &[Attribute::Bold],
            ));
            columns.push(format!("{:>CW_SIZE$}", format_size(outcome.size)));
        }

        columns.push(format!(
            "{:>CW_ELAPSED$}",
            format_seconds(outcome.elapsed.as_secs_f64())
        ));

        if self.opts.show_id {
            let width = self.id_width + 1;
            columns.push(self.styled(
                format!("{:>width$}", format!("#{}", outcome.request_id)),
                Some(Color::Yellow),
                &[],
            ));
        }

        let method = self.styled(
            format!("{:>width$}", outcome.method, width = self.method_width),
            None,
            &[Attribute::Bold],
        );
        let mut tail = format!("{method} {}", outcome.url);
        if self.opts.show_error {
            if let Some(error) = &outcome.error {
                tail.push_str(COLUMN_PAD);
                tail.push_str(&self.styled(
                    error.message.trim().to_string(),
                    Some(Color::Red),
                    &[Attribute::Dim],
                ));
            }
        }
        columns.push(tail);

        columns.join(COLUMN_PAD)
    }

    fn render_footer(&self, current: u64) -> String {
        let total = self.state.total().max(1);
        let percent = 100 * current / total;
        let width = self.id_width;
        format!("[ {percent:>3}% {current:>width$}/{total:<width$} ]")
    }

    fn footer(&mut self, current: u64) {
        if !self.opts.footer {
            return;
        }
        let text = self.render_footer(current);
        self.write(&text, false);
    }

    fn separator(&mut self) {
        self.line("-".repeat(SEPARATOR_WIDTH));
    }

    /// A full line: return the cursor to column 1 first so the footer under it
    /// is overwritten rather than accumulated.
    fn line(&mut self, text: String) {
        self.reset_cursor();
        self.write(&text, true);
    }

    fn reset_cursor(&mut self) {
        if !self.opts.footer {
            return;
        }
        let mut sequence = String::new();
        if MoveToColumn(0).write_ansi(&mut sequence).is_ok() {
            self.write(&sequence, false);
        }
    }

    fn write(&mut self, text: &str, newline: bool) {
        if self.broken {
            return;
        }
        let result = (|| -> io::Result<()> {
            let mut out = self.out.lock();
            out.write_all(text.as_bytes())?;
            if newline {
                out.write_all(b"\n")?;
            }
            out.flush()
        })();
        if result.is_err() {
            // Broken pipe: discard everything from here on.
            self.broken = true;
        }
    }

    fn styled(&self, text: String, color: Option<Color>, attrs: &[Attribute]) -> String {
        if !self.opts.color {
            return text;
        }
        let mut content: StyledContent<String> = text.stylize();
        if let Some(color) = color {
            content = content.with(color);
        }
        for attr in attrs {
            content = content.attribute(*attr);
        }
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upcheck_engine::{RequestError, Task, TaskQueue};

    fn seeded_state(urls: usize, copies: u64) -> Arc<SharedState> {
        let state = Arc::new(SharedState::new(1));
        let queue = TaskQueue::new();
        for n in 0..urls {
            queue.append(Task::get(format!("http://host/{n}")), copies, &state);
        }
        state
    }

    fn plain_printer(state: Arc<SharedState>) -> Printer {
        Printer::new(
            PrinterOptions {
                color: false,
                footer: false,
                show_id: false,
                show_error: false,
            },
            state,
        )
    }

    fn success_outcome(request_id: u64) -> RequestOutcome {
        RequestOutcome {
            request_id,
            method: "GET".to_string(),
            url: "http://host/0".to_string(),
            status: Some(upcheck_engine::StatusCode::OK),
            ok: true,
            size: 605,
            elapsed: Duration::from_millis(23),
            error: None,
        }
    }

    fn failure_outcome(request_id: u64) -> RequestOutcome {
        RequestOutcome {
            request_id,
            method: "GET".to_string(),
            url: "http://host/0".to_string(),
            status: None,
            ok: false,
            size: 0,
            elapsed: Duration::from_millis(5),
            error: Some(RequestError {
                kind: "Connect",
                message: " connection refused ".to_string(),
            }),
        }
    }

    #[test]
    fn plain_rows_carry_no_ansi_bytes() {
        let printer = plain_printer(seeded_state(1, 1));
        let row = printer.render_row(&success_outcome(1));
        assert!(!row.contains('\x1b'));
        assert_eq!(row, " 200     605b     23ms  GET http://host/0");
    }

    #[test]
    fn colored_rows_style_the_status() {
        let state = seeded_state(1, 1);
        let printer = Printer::new(
            PrinterOptions {
                color: true,
                footer: false,
                show_id: false,
                show_error: false,
            },
            state,
        );
        let row = printer.render_row(&success_outcome(1));
        assert!(row.contains('\x1b'));
        assert!(row.contains("200"));
    }

    #[test]
    fn error_rows_span_status_and_size_columns() {
        let printer = plain_printer(seeded_state(1, 1));
        let row = printer.render_row(&failure_outcome(1));
        assert_eq!(row, "      Connect      5ms  GET http://host/0");
        // The elapsed column starts where it does on success rows.
        let success = printer.render_row(&success_outcome(1));
        assert_eq!(row.find("5ms").map(|i| i + 3), success.find("23ms").map(|i| i + 4));
    }

    #[test]
    fn show_error_appends_the_trimmed_message() {
        let state = seeded_state(1, 1);
        let printer = Printer::new(
            PrinterOptions {
                color: false,
                footer: false,
                show_id: false,
                show_error: true,
            },
            state,
        );
        let row = printer.render_row(&failure_outcome(1));
        assert!(row.ends_with("GET http://host/0  connection refused"));
    }

    #[test]
    fn show_id_inserts_a_sized_id_column() {
        let state = seeded_state(1, 100);
        let printer = Printer::new(
            PrinterOptions {
                color: false,
                footer: false,
                show_id: true,
                show_error: false,
            },
            state,
        );
        let row = printer.render_row(&success_outcome(7));
        // Total is 100, so ids right-align in four characters ("#100").
        assert!(row.contains("    #7  GET"));
    }

    #[test]
    fn footer_counts_and_never_contains_a_newline() {
        let printer = plain_printer(seeded_state(1, 100));
        assert_eq!(printer.render_footer(0), "[   0%   0/100 ]");
        assert_eq!(printer.render_footer(12), "[  12%  12/100 ]");
        assert_eq!(printer.render_footer(100), "[ 100% 100/100 ]");
        assert!(!printer.render_footer(12).contains('\n'));
    }

    #[test]
    fn method_column_width_follows_the_widest_method() {
        let state = Arc::new(SharedState::new(1));
        let queue = TaskQueue::new();
        let mut task = Task::get("http://host/0");
        task.method = "DELETE".to_string();
        queue.append(task, 1, &state);
        queue.append(Task::get("http://host/1"), 1, &state);
        let printer = plain_printer(state);
        let row = printer.render_row(&success_outcome(1));
        assert!(row.contains("     GET http://host/0"));
    }
}
