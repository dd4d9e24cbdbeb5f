//! Terminal rendering of run updates.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pdfdesk_core::util::display_name;
use pdfdesk_core::{FileOutcome, RunUpdate};

const OVERALL_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}";
const FILE_TEMPLATE: &str = "  {prefix:.bold} [{bar:30.yellow/blue}] {pos:>3}% {wide_msg}";

fn bar_style(template: &str) -> ProgressStyle {
    // Templates are hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    ProgressStyle::default_bar()
        .template(template)
        .unwrap()
        .progress_chars("#>-")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(value: f64) -> u64 {
    value.clamp(0.0, 100.0).round() as u64
}

/// Two bars: files attempted, and engine progress on the current file.
pub struct ProgressView {
    multi: MultiProgress,
    overall: ProgressBar,
    file: ProgressBar,
}

impl ProgressView {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(100));
        overall.set_style(bar_style(OVERALL_TEMPLATE));
        let file = multi.add(ProgressBar::new(100));
        file.set_style(bar_style(FILE_TEMPLATE));

        Self {
            multi,
            overall,
            file,
        }
    }

    /// Print above the bars without tearing them.
    pub fn println(&self, line: impl AsRef<str>) {
        let _ = self.multi.println(line);
    }

    pub fn apply(&self, update: &RunUpdate) {
        match update {
            RunUpdate::Started { total, .. } => {
                self.overall.set_message(format!("0/{total} files"));
            }
            RunUpdate::FileStarted { index, total, path } => {
                self.file.set_position(0);
                self.file.set_prefix(display_name(path));
                self.file.set_message("Starting");
                self.overall.set_message(format!("{}/{} files", index + 1, total));
            }
            RunUpdate::FileProgress {
                stage,
                overall_progress,
                ..
            } => {
                self.file.set_position(percent(*overall_progress));
                self.file.set_message(stage.clone());
            }
            RunUpdate::FileFinished(outcome) => self.println(outcome_line(outcome)),
            RunUpdate::OverallProgress(value) => self.overall.set_position(percent(*value)),
            RunUpdate::Completed(summary) => {
                self.file.finish_and_clear();
                self.overall.finish_with_message(format!(
                    "{} succeeded, {} failed",
                    summary.succeeded(),
                    summary.failed()
                ));
            }
            RunUpdate::Aborted { message } => {
                self.file.finish_and_clear();
                self.overall.abandon_with_message(format!("Aborted: {message}"));
            }
        }
    }
}

pub fn outcome_line(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Translated { path, result } => {
            let mut line = format!("ok   {}", display_name(path));
            for produced in [&result.mono_pdf_path, &result.dual_pdf_path]
                .into_iter()
                .flatten()
            {
                line.push_str(&format!("\n       -> {}", produced.display()));
            }
            line
        }
        FileOutcome::Failed { path, message } => {
            format!("FAIL {}: {}", display_name(path), message)
        }
    }
}
