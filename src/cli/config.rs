//! Conversion of CLI arguments into library configuration

use crate::cli::main_impl::DownloadArgs;
use crate::config::{AcquisitionConfig, AnnotationConfig, SplitStrategy};
use anyhow::{Context, Result};
use std::path::Path;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Base configuration: the `--config` file when given, defaults otherwise
    pub(crate) fn base_config(config_file: Option<&Path>) -> Result<AcquisitionConfig> {
        match config_file {
            Some(path) => AcquisitionConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display())),
            None => Ok(AcquisitionConfig::default()),
        }
    }

    /// Apply `download` flags on top of the base configuration
    pub(crate) fn acquisition_config(
        config_file: Option<&Path>,
        args: &DownloadArgs,
    ) -> Result<AcquisitionConfig> {
        let mut config = Self::base_config(config_file)?;

        if let Some(root) = &args.root {
            config.dataset_root.clone_from(root);
        }
        if !args.subject.is_empty() {
            config.subjects.clone_from(&args.subject);
        }
        if let Some(fraction) = args.train_fraction {
            config.train_fraction = fraction;
        }
        if let Some(count) = args.images_per_query {
            config.images_per_query = count;
        }
        if let Some(count) = args.queries_per_subject {
            config.queries_per_subject = count;
        }
        if let Some(seed) = args.shuffle_seed {
            config.split_strategy = SplitStrategy::Shuffled { seed };
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Annotation settings with an optional confidence override
    pub(crate) fn annotation_config(confidence: Option<f32>) -> Result<AnnotationConfig> {
        let mut config = AnnotationConfig::default();
        if let Some(confidence) = confidence {
            config.confidence_threshold = confidence;
        }
        config.validate().context("Invalid annotation settings")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn download_args(argv: &[&str]) -> DownloadArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Download(args) => args,
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = download_args(&["car-dataset", "download"]);
        let config = CliConfigBuilder::acquisition_config(None, &args).unwrap();
        assert_eq!(config, AcquisitionConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = download_args(&[
            "car-dataset",
            "download",
            "--root",
            "out",
            "--subject",
            "Ferrari F40",
            "--subject",
            "Porsche 918 Spyder",
            "--train-fraction",
            "0.5",
            "--shuffle-seed",
            "7",
        ]);
        let config = CliConfigBuilder::acquisition_config(None, &args).unwrap();

        assert_eq!(config.dataset_root, PathBuf::from("out"));
        assert_eq!(config.subjects, vec!["Ferrari F40", "Porsche 918 Spyder"]);
        assert!((config.train_fraction - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.split_strategy, SplitStrategy::Shuffled { seed: 7 });
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let args = download_args(&["car-dataset", "download", "--train-fraction", "1.5"]);
        assert!(CliConfigBuilder::acquisition_config(None, &args).is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("dataset.json");
        std::fs::write(
            &file,
            r#"{"subjects": ["Audi R8 2014"], "inter_query_delay": 0.5, "images_per_query": 12}"#,
        )
        .unwrap();

        let args = download_args(&["car-dataset", "download", "--images-per-query", "20"]);
        let config = CliConfigBuilder::acquisition_config(Some(&file), &args).unwrap();

        assert_eq!(config.subjects, vec!["Audi R8 2014"]);
        assert_eq!(config.inter_query_delay, Duration::from_millis(500));
        assert_eq!(config.images_per_query, 20);
    }

    #[test]
    fn test_annotation_confidence_override() {
        let config = CliConfigBuilder::annotation_config(Some(0.5)).unwrap();
        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!(CliConfigBuilder::annotation_config(Some(2.0)).is_err());
    }
}
