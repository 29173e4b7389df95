//! Configuration types for dataset acquisition and annotation

use crate::error::{DatasetError, Result};
use crate::layout::Subject;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Subjects collected when no configuration file is supplied
pub const DEFAULT_SUBJECTS: &[&str] = &[
    "Ford Mustang GT Convertible 2020",
    "Audi R8 2014",
    "Audi RS6 Avant 2020",
    "BMW X5 2015",
    "Ferrari F8 Tributo 2020",
    "Ferrari F40",
    "Lamborghini Gallardo 2010",
    "Mercedes AMG GT 2015",
    "Porsche 911 2020",
    "Tesla Cybertruck 2023",
];

/// Default dataset root directory
pub const DEFAULT_DATASET_ROOT: &str = "car_dataset";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Descriptor axes combined with a subject to diversify search queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorAxes {
    pub viewpoints: Vec<String>,
    pub lighting: Vec<String>,
    pub settings: Vec<String>,
}

impl Default for DescriptorAxes {
    fn default() -> Self {
        fn owned(values: &[&str]) -> Vec<String> {
            values.iter().map(|s| (*s).to_string()).collect()
        }

        Self {
            viewpoints: owned(&["front view", "side view", "rear view", "three quarter view"]),
            lighting: owned(&["daylight", "at night", "sunset"]),
            settings: owned(&["on the street", "in a showroom", "on a race track"]),
        }
    }
}

/// What to do when the search provider fails for a reason other than throttling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorPolicy {
    /// Log the failure and continue with an empty result
    #[default]
    Skip,
    /// Retry with the same backoff schedule used for rate limiting
    Retry,
    /// Propagate the error and stop the run
    Abort,
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry, doubled after each one
    #[serde(with = "duration_secs")]
    pub initial_backoff: Duration,
    pub provider_errors: ProviderErrorPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(10),
            provider_errors: ProviderErrorPolicy::default(),
        }
    }
}

/// How a subject's aggregated locators are divided into train and val
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SplitStrategy {
    /// The first `floor(n * train_fraction)` locators go to train
    #[default]
    Positional,
    /// Shuffle with a seeded RNG, then cut positionally
    Shuffled { seed: u64 },
}

/// Configuration for the image acquisition pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub subjects: Vec<String>,
    pub dataset_root: PathBuf,
    pub descriptors: DescriptorAxes,
    /// Locators requested per query
    pub images_per_query: usize,
    /// Upper bound on generated queries per subject
    pub queries_per_subject: usize,
    /// Fraction of each subject's locators routed to train (0.0-1.0)
    pub train_fraction: f64,
    pub retry: RetryPolicy,
    #[serde(with = "duration_secs")]
    pub inter_query_delay: Duration,
    #[serde(with = "duration_secs")]
    pub inter_subject_delay: Duration,
    /// Per-image HTTP timeout
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,
    /// JPEG quality for saved images (1-100)
    pub jpeg_quality: u8,
    pub split_strategy: SplitStrategy,
    pub user_agent: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            subjects: DEFAULT_SUBJECTS.iter().map(|s| (*s).to_string()).collect(),
            dataset_root: PathBuf::from(DEFAULT_DATASET_ROOT),
            descriptors: DescriptorAxes::default(),
            images_per_query: 30,
            queries_per_subject: 5,
            train_fraction: 0.8,
            retry: RetryPolicy::default(),
            inter_query_delay: Duration::from_secs(2),
            inter_subject_delay: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(5),
            jpeg_quality: 90,
            split_strategy: SplitStrategy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AcquisitionConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use car_dataset::AcquisitionConfig;
    ///
    /// let config = AcquisitionConfig::builder()
    ///     .subjects(["Ferrari F40"])
    ///     .dataset_root("my_dataset")
    ///     .train_fraction(0.75)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.subjects.len(), 1);
    /// ```
    #[must_use]
    pub fn builder() -> AcquisitionConfigBuilder {
        AcquisitionConfigBuilder::default()
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::file_io_error("read configuration", path, &e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Subjects as typed values
    #[must_use]
    pub fn subject_list(&self) -> Vec<Subject> {
        self.subjects.iter().map(|s| Subject::new(s.as_str())).collect()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty or blank subjects
    /// - Zero images per query or queries per subject
    /// - Train fraction outside 0.0-1.0
    /// - JPEG quality outside 1-100
    /// - Empty descriptor axis
    pub fn validate(&self) -> Result<()> {
        if self.subjects.is_empty() {
            return Err(DatasetError::invalid_config("At least one subject is required"));
        }
        if let Some(position) = self.subjects.iter().position(|s| s.trim().is_empty()) {
            return Err(DatasetError::invalid_config(format!(
                "Subject #{} is blank",
                position + 1
            )));
        }
        if self.images_per_query == 0 {
            return Err(DatasetError::config_value_error(
                "images per query",
                0,
                "1+",
                Some(30),
            ));
        }
        if self.queries_per_subject == 0 {
            return Err(DatasetError::config_value_error(
                "queries per subject",
                0,
                "1+",
                Some(5),
            ));
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(DatasetError::config_value_error(
                "train fraction",
                self.train_fraction,
                "0.0-1.0",
                Some(0.8),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(DatasetError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "1-100",
                Some(90),
            ));
        }
        for (axis, values) in [
            ("viewpoints", &self.descriptors.viewpoints),
            ("lighting", &self.descriptors.lighting),
            ("settings", &self.descriptors.settings),
        ] {
            if values.is_empty() {
                return Err(DatasetError::invalid_config(format!(
                    "Descriptor axis '{axis}' must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for `AcquisitionConfig`
#[derive(Debug, Default)]
pub struct AcquisitionConfigBuilder {
    config: AcquisitionConfig,
}

impl AcquisitionConfigBuilder {
    #[must_use]
    pub fn subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn dataset_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.dataset_root = root.into();
        self
    }

    #[must_use]
    pub fn descriptors(mut self, descriptors: DescriptorAxes) -> Self {
        self.config.descriptors = descriptors;
        self
    }

    #[must_use]
    pub fn images_per_query(mut self, count: usize) -> Self {
        self.config.images_per_query = count;
        self
    }

    #[must_use]
    pub fn queries_per_subject(mut self, count: usize) -> Self {
        self.config.queries_per_subject = count;
        self
    }

    #[must_use]
    pub fn train_fraction(mut self, fraction: f64) -> Self {
        self.config.train_fraction = fraction;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    #[must_use]
    pub fn inter_query_delay(mut self, delay: Duration) -> Self {
        self.config.inter_query_delay = delay;
        self
    }

    #[must_use]
    pub fn inter_subject_delay(mut self, delay: Duration) -> Self {
        self.config.inter_subject_delay = delay;
        self
    }

    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Set JPEG quality, clamped to 1-100
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    #[must_use]
    pub fn split_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.config.split_strategy = strategy;
        self
    }

    #[must_use]
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AcquisitionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for detector-driven auto-annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Minimum detector confidence for a box to be considered
    pub confidence_threshold: f32,
    /// Detector class name that is relabelled with the subject's class id
    pub target_label: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            target_label: "car".to_string(),
        }
    }
}

impl AnnotationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DatasetError::config_value_error(
                "confidence threshold",
                self.confidence_threshold,
                "0.0-1.0",
                Some(0.3),
            ));
        }
        if self.target_label.trim().is_empty() {
            return Err(DatasetError::invalid_config("Target label must not be empty"));
        }
        Ok(())
    }
}

/// Durations are written as (fractional) seconds in configuration files
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
