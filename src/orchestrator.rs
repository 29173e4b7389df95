//! Acquisition orchestrator
//!
//! Drives the per-subject loop: generate queries, search each one with
//! backoff, split the aggregated locators into train/val, and save every
//! locator under the next free index of its split. All collaborators are
//! injected so they can be replaced in tests.

use crate::{
    config::{AcquisitionConfig, SplitStrategy},
    error::{DatasetError, Result},
    fetch::{FetchOutcome, HttpImageFetcher, ImageFetcher},
    layout::{DatasetLayout, Split, Subject},
    query::QueryGenerator,
    retry::{RetryController, Sleeper, TokioSleeper},
    search::{DuckDuckGoClient, SearchClient},
    services::{AcquisitionEvent, ProgressReporter, TracingProgressReporter},
};
use instant::Instant;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of acquiring one subject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectReport {
    pub subject: String,
    pub queries: usize,
    pub locators: usize,
    pub n_train: usize,
    pub train_saved: usize,
    pub val_saved: usize,
    /// Skipped locators keyed by failure kind
    pub skipped: BTreeMap<String, usize>,
}

impl SubjectReport {
    #[must_use]
    pub fn saved(&self) -> usize {
        self.train_saved + self.val_saved
    }

    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Outcome of a full acquisition run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AcquisitionReport {
    pub subjects: Vec<SubjectReport>,
    pub elapsed_secs: f64,
}

impl AcquisitionReport {
    #[must_use]
    pub fn total_saved(&self) -> usize {
        self.subjects.iter().map(SubjectReport::saved).sum()
    }

    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.subjects.iter().map(SubjectReport::skipped_total).sum()
    }
}

/// Number of locators routed to train: `floor(total * train_fraction)`
#[must_use]
pub fn train_count(total: usize, train_fraction: f64) -> usize {
    let n = (total as f64 * train_fraction.clamp(0.0, 1.0)).floor() as usize;
    n.min(total)
}

/// Assign each locator a split according to `strategy`
#[must_use]
pub fn plan_splits(
    mut locators: Vec<String>,
    train_fraction: f64,
    strategy: SplitStrategy,
) -> Vec<(Split, String)> {
    if let SplitStrategy::Shuffled { seed } = strategy {
        let mut rng = StdRng::seed_from_u64(seed);
        locators.shuffle(&mut rng);
    }
    let n_train = train_count(locators.len(), train_fraction);
    locators
        .into_iter()
        .enumerate()
        .map(|(position, locator)| {
            let split = if position < n_train {
                Split::Train
            } else {
                Split::Val
            };
            (split, locator)
        })
        .collect()
}

/// Owns the pipeline collaborators and runs acquisition
pub struct AcquisitionOrchestrator {
    config: AcquisitionConfig,
    queries: QueryGenerator,
    search: Box<dyn SearchClient>,
    retry: RetryController,
    fetcher: Box<dyn ImageFetcher>,
    layout: DatasetLayout,
    sleeper: Arc<dyn Sleeper>,
    reporter: Box<dyn ProgressReporter>,
}

impl AcquisitionOrchestrator {
    /// Create an orchestrator with the default HTTP collaborators
    pub fn new(config: AcquisitionConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    #[must_use]
    pub fn builder(config: AcquisitionConfig) -> AcquisitionOrchestratorBuilder {
        AcquisitionOrchestratorBuilder {
            config,
            search: None,
            fetcher: None,
            sleeper: None,
            reporter: None,
            layout: None,
            queries: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Acquire every configured subject in order
    ///
    /// # Errors
    /// - Dataset directories cannot be created or scanned
    /// - Search failed under `ProviderErrorPolicy::Abort`
    pub async fn run(&self) -> Result<AcquisitionReport> {
        let start = Instant::now();
        let subjects = self.config.subject_list();
        let mut report = AcquisitionReport::default();

        info!(
            subjects = subjects.len(),
            root = %self.layout.root().display(),
            provider = self.search.name(),
            "Starting acquisition"
        );

        for (index, subject) in subjects.iter().enumerate() {
            self.reporter.report(AcquisitionEvent::SubjectStarted {
                subject: subject.name(),
                index,
                total: subjects.len(),
            });
            let subject_report = self.acquire_subject(subject).await?;
            self.reporter.report(AcquisitionEvent::SubjectFinished {
                subject: subject.name(),
                train_saved: subject_report.train_saved,
                val_saved: subject_report.val_saved,
            });
            report.subjects.push(subject_report);

            self.sleeper.sleep(self.config.inter_subject_delay).await;
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            saved = report.total_saved(),
            skipped = report.total_skipped(),
            elapsed_secs = report.elapsed_secs,
            "Acquisition finished"
        );
        Ok(report)
    }

    /// Acquire a single subject
    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn acquire_subject(&self, subject: &Subject) -> Result<SubjectReport> {
        let queries = self.queries.generate(subject.name());
        let mut locators = Vec::new();

        for query in &queries {
            let found = self
                .retry
                .search_with_retry(self.search.as_ref(), query, self.config.images_per_query)
                .await?;
            self.reporter.report(AcquisitionEvent::QueryCompleted {
                subject: subject.name(),
                query,
                locators: found.len(),
            });
            locators.extend(found);
            self.sleeper.sleep(self.config.inter_query_delay).await;
        }

        let mut report = SubjectReport {
            subject: subject.name().to_string(),
            queries: queries.len(),
            locators: locators.len(),
            n_train: train_count(locators.len(), self.config.train_fraction),
            ..SubjectReport::default()
        };

        let planned = plan_splits(
            locators,
            self.config.train_fraction,
            self.config.split_strategy,
        );
        self.reporter.report(AcquisitionEvent::DownloadsPlanned {
            subject: subject.name(),
            count: planned.len(),
        });

        let dirs = self.layout.ensure_dirs(subject)?;
        let prefix = subject.file_prefix();
        let mut next_train = free_index(&dirs.train, &prefix)?;
        let mut next_val = free_index(&dirs.val, &prefix)?;

        for (split, locator) in &planned {
            let next = match split {
                Split::Train => &mut next_train,
                Split::Val => &mut next_val,
            };

            let Some(index) = *next else {
                let outcome = FetchOutcome::WriteFailed(format!(
                    "no free image index left in {}",
                    dirs.get(*split).display()
                ));
                warn!(split = %split, locator = %locator, "Image indices exhausted, skipping");
                *report.skipped.entry(outcome.kind().to_string()).or_default() += 1;
                self.reporter.report(AcquisitionEvent::ImageSkipped {
                    subject: subject.name(),
                    locator,
                    outcome: &outcome,
                });
                continue;
            };
            let path = dirs
                .get(*split)
                .join(DatasetLayout::entry_file_name(&prefix, index));

            let outcome = self.fetcher.fetch_and_save(locator, &path).await;
            if let FetchOutcome::Saved = outcome {
                *next = index.checked_add(1);
                match split {
                    Split::Train => report.train_saved += 1,
                    Split::Val => report.val_saved += 1,
                }
                self.reporter.report(AcquisitionEvent::ImageSaved {
                    subject: subject.name(),
                    split: *split,
                    path: &path,
                });
            } else {
                *report.skipped.entry(outcome.kind().to_string()).or_default() += 1;
                self.reporter.report(AcquisitionEvent::ImageSkipped {
                    subject: subject.name(),
                    locator,
                    outcome: &outcome,
                });
            }
        }

        Ok(report)
    }
}

/// Next free index in `dir`, or `None` once every index is taken
fn free_index(dir: &Path, prefix: &str) -> Result<Option<u32>> {
    match DatasetLayout::next_index(dir, prefix) {
        Ok(index) => Ok(Some(index)),
        Err(DatasetError::IndexExhausted { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Builder for `AcquisitionOrchestrator`; unset collaborators use defaults
pub struct AcquisitionOrchestratorBuilder {
    config: AcquisitionConfig,
    search: Option<Box<dyn SearchClient>>,
    fetcher: Option<Box<dyn ImageFetcher>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    reporter: Option<Box<dyn ProgressReporter>>,
    layout: Option<DatasetLayout>,
    queries: Option<QueryGenerator>,
}

impl AcquisitionOrchestratorBuilder {
    #[must_use]
    pub fn search_client(mut self, client: Box<dyn SearchClient>) -> Self {
        self.search = Some(client);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Box<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Override the dataset layout (defaults to `config.dataset_root`)
    #[must_use]
    pub fn layout(mut self, layout: DatasetLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use]
    pub fn query_generator(mut self, queries: QueryGenerator) -> Self {
        self.queries = Some(queries);
        self
    }

    /// Validate the configuration and assemble the orchestrator
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to create default HTTP clients
    pub fn build(self) -> Result<AcquisitionOrchestrator> {
        let config = self.config;
        config.validate()?;

        let search = match self.search {
            Some(search) => search,
            None => Box::new(DuckDuckGoClient::new(&config.user_agent)?),
        };
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpImageFetcher::new(
                &config.user_agent,
                config.fetch_timeout,
                config.jpeg_quality,
            )?),
        };
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let reporter = self
            .reporter
            .unwrap_or_else(|| Box::new(TracingProgressReporter));
        let layout = self
            .layout
            .unwrap_or_else(|| DatasetLayout::new(config.dataset_root.clone()));
        let queries = self.queries.unwrap_or_else(|| {
            QueryGenerator::new(config.descriptors.clone(), config.queries_per_subject)
        });
        let retry = RetryController::new(config.retry.clone(), Arc::clone(&sleeper));

        Ok(AcquisitionOrchestrator {
            config,
            queries,
            search,
            retry,
            fetcher,
            layout,
            sleeper,
            reporter,
        })
    }
}
