//! Progress bar reporter for the download command

use crate::services::{AcquisitionEvent, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Shows one bar per subject: downloads done out of downloads planned
#[derive(Debug, Clone)]
pub struct CliProgressReporter {
    bar: ProgressBar,
}

impl CliProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {prefix:.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Handle for finishing the bar once the run is over
    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl Default for CliProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliProgressReporter {
    fn report(&self, event: AcquisitionEvent<'_>) {
        match event {
            AcquisitionEvent::SubjectStarted {
                subject,
                index,
                total,
            } => {
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_prefix(format!("[{}/{total}] {subject}", index + 1));
                self.bar.set_message("searching");
            },
            AcquisitionEvent::QueryCompleted {
                query, locators, ..
            } => {
                self.bar.set_message(format!("{locators} result(s) for \"{query}\""));
            },
            AcquisitionEvent::DownloadsPlanned { count, .. } => {
                self.bar.set_length(count as u64);
                self.bar.set_message("downloading");
            },
            AcquisitionEvent::ImageSaved { .. } => self.bar.inc(1),
            AcquisitionEvent::ImageSkipped {
                locator, outcome, ..
            } => {
                debug!(locator = %locator, reason = %outcome, "Skipped candidate");
                self.bar.inc(1);
            },
            AcquisitionEvent::SubjectFinished {
                subject,
                train_saved,
                val_saved,
            } => {
                self.bar.println(format!(
                    "✅ {subject}: {train_saved} train, {val_saved} val"
                ));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Split;
    use std::path::Path;

    #[test]
    fn test_bar_tracks_planned_downloads() {
        let reporter = CliProgressReporter::new();
        reporter.bar().set_draw_target(indicatif::ProgressDrawTarget::hidden());

        reporter.report(AcquisitionEvent::SubjectStarted {
            subject: "Ferrari F40",
            index: 0,
            total: 1,
        });
        reporter.report(AcquisitionEvent::DownloadsPlanned {
            subject: "Ferrari F40",
            count: 3,
        });
        reporter.report(AcquisitionEvent::ImageSaved {
            subject: "Ferrari F40",
            split: Split::Train,
            path: Path::new("ferrari_f40_001.jpg"),
        });

        assert_eq!(reporter.bar().length(), Some(3));
        assert_eq!(reporter.bar().position(), 1);
    }
}
