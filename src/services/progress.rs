//! Progress reporting service
//!
//! The orchestrator emits [`AcquisitionEvent`]s; frontends decide how to show
//! them (a progress bar in the CLI, log lines, or nothing at all).

use crate::fetch::FetchOutcome;
use crate::layout::Split;
use std::path::Path;

/// Events emitted while acquiring a dataset
#[derive(Debug, Clone, Copy)]
pub enum AcquisitionEvent<'a> {
    /// A subject is about to be processed
    SubjectStarted {
        subject: &'a str,
        index: usize,
        total: usize,
    },
    /// A query finished (after any retries)
    QueryCompleted {
        subject: &'a str,
        query: &'a str,
        locators: usize,
    },
    /// Locators for a subject are known and about to be downloaded
    DownloadsPlanned { subject: &'a str, count: usize },
    /// One image was saved
    ImageSaved {
        subject: &'a str,
        split: Split,
        path: &'a Path,
    },
    /// One locator was skipped
    ImageSkipped {
        subject: &'a str,
        locator: &'a str,
        outcome: &'a FetchOutcome,
    },
    /// A subject finished
    SubjectFinished {
        subject: &'a str,
        train_saved: usize,
        val_saved: usize,
    },
}

/// Trait for progress reporting implementations
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: AcquisitionEvent<'_>);
}

/// Reporter that discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report(&self, _event: AcquisitionEvent<'_>) {}
}

/// Reporter that turns events into tracing log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report(&self, event: AcquisitionEvent<'_>) {
        match event {
            AcquisitionEvent::SubjectStarted {
                subject,
                index,
                total,
            } => {
                tracing::info!("🔍 [{}/{}] Collecting images for {}", index + 1, total, subject);
            },
            AcquisitionEvent::QueryCompleted {
                query, locators, ..
            } => {
                tracing::info!(query = %query, locators, "Query completed");
            },
            AcquisitionEvent::DownloadsPlanned { subject, count } => {
                tracing::info!(subject = %subject, count, "Downloading candidates");
            },
            AcquisitionEvent::ImageSaved { path, .. } => {
                tracing::debug!("✅ {}", path.display());
            },
            AcquisitionEvent::ImageSkipped {
                locator, outcome, ..
            } => {
                tracing::warn!("⚠️ Skipped {}: {}", locator, outcome);
            },
            AcquisitionEvent::SubjectFinished {
                subject,
                train_saved,
                val_saved,
            } => {
                tracing::info!(
                    "✅ {} images saved for {} ({} train, {} val)",
                    train_saved + val_saved,
                    subject,
                    train_saved,
                    val_saved
                );
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingReporter {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for CountingReporter {
        fn report(&self, event: AcquisitionEvent<'_>) {
            self.events.lock().unwrap().push(format!("{event:?}"));
        }
    }

    #[test]
    fn test_reporters_accept_all_events() {
        let outcome = FetchOutcome::DecodeFailed("bad bytes".to_string());
        let events = [
            AcquisitionEvent::SubjectStarted {
                subject: "F40",
                index: 0,
                total: 1,
            },
            AcquisitionEvent::QueryCompleted {
                subject: "F40",
                query: "F40 front view",
                locators: 3,
            },
            AcquisitionEvent::DownloadsPlanned {
                subject: "F40",
                count: 3,
            },
            AcquisitionEvent::ImageSaved {
                subject: "F40",
                split: Split::Train,
                path: Path::new("f40_001.jpg"),
            },
            AcquisitionEvent::ImageSkipped {
                subject: "F40",
                locator: "https://example.invalid/x.jpg",
                outcome: &outcome,
            },
            AcquisitionEvent::SubjectFinished {
                subject: "F40",
                train_saved: 1,
                val_saved: 0,
            },
        ];

        let counting = CountingReporter::default();
        for event in events {
            NoOpProgressReporter.report(event);
            TracingProgressReporter.report(event);
            counting.report(event);
        }
        assert_eq!(counting.events.lock().unwrap().len(), 6);
    }
}
