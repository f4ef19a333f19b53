//! Batch report: counts, one line per failure, exit status.

use std::fmt;
use std::time::Duration;

use owo_colors::OwoColorize;

use crate::render::{ErrorKind, RenderOutcome};
use crate::utils::plural_count;

/// Aggregated outcomes of one render batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful tasks, including unchanged ones
    pub succeeded: usize,
    /// Successful tasks whose output already held identical content
    pub unchanged: usize,
    pub cancelled: usize,
    /// `"{entry}: {kind}: {message} ({cause})"` per failed task
    pub failures: Vec<String>,
    /// `"{entry}: {warning}"` per non-fatal problem
    pub warnings: Vec<String>,
    /// Ids of the rendered entries, in completion order
    pub rendered: Vec<String>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn new(outcomes: &[RenderOutcome], elapsed: Duration) -> Self {
        let mut report = Self {
            elapsed,
            ..Self::default()
        };

        for outcome in outcomes {
            match outcome {
                RenderOutcome::Succeeded {
                    entry,
                    unchanged,
                    warnings,
                    ..
                } => {
                    report.succeeded += 1;
                    report.unchanged += usize::from(*unchanged);
                    report.rendered.push(entry.id.clone());
                    report
                        .warnings
                        .extend(warnings.iter().map(|w| format!("{entry}: {w}")));
                }
                RenderOutcome::Failed { kind, .. } => {
                    if *kind == ErrorKind::Cancelled {
                        report.cancelled += 1;
                    }
                    report.failures.push(outcome.to_string());
                }
            }
        }

        report.failures.sort();
        report
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// No task failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// At least one task succeeded, so clients have something new to show.
    pub fn any_success(&self) -> bool {
        self.succeeded > 0
    }

    /// Process exit code for a one-shot run.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Failure lines, indented for a status block.
    pub fn detail(&self) -> String {
        self.failures
            .iter()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Print the full report (one-shot mode).
    pub fn print(&self) {
        for warning in &self.warnings {
            crate::log!("warn"; "{}", warning);
        }
        for failure in &self.failures {
            crate::log!("error"; "{}", failure);
        }
        crate::log!("render"; "{}", self);
    }

    /// Overwrite the watch-mode status block with this batch.
    pub fn print_status(&self) {
        if self.total() == 0 {
            return;
        }
        if !self.warnings.is_empty() {
            crate::logger::status_warning(&self.warnings.join("\n"));
            crate::logger::status_detach();
        }
        if self.is_success() {
            let message = match self.rendered.as_slice() {
                [one] => format!("rendered {one}"),
                _ => format!("rendered {}", plural_count(self.succeeded, "entry point")),
            };
            crate::logger::status_success(&message);
        } else {
            crate::logger::status_error(&self.to_string(), &self.detail());
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = format!("in {}ms", self.elapsed.as_millis());
        if self.is_success() {
            write!(
                f,
                "{} {}",
                format!("rendered {}", plural_count(self.succeeded, "entry point")).green(),
                elapsed.dimmed()
            )?;
            if self.unchanged > 0 {
                write!(f, " {}", format!("({} unchanged)", self.unchanged).dimmed())?;
            }
            Ok(())
        } else {
            write!(
                f,
                "{} of {} failed, {} succeeded {}",
                self.failed().to_string().red().bold(),
                plural_count(self.total(), "entry point"),
                self.succeeded,
                elapsed.dimmed()
            )?;
            if self.cancelled > 0 {
                write!(f, " {}", format!("({} cancelled)", self.cancelled).dimmed())?;
            }
            Ok(())
        }
    }
}
