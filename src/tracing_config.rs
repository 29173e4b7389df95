//! Tracing subscriber setup for the command-line tool
//!
//! The library only emits events; the binary decides where they go.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors
    Console,
    /// Compact uncolored output for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Where log lines are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    Console,
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
}

#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v`
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Explicit filter directive, takes precedence over verbosity
    pub env_filter: Option<String>,
    /// Run identifier logged once at startup
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Map verbosity to a filter directive
    ///
    /// Dependency crates stay at `warn` so `-vv` does not drown in HTTP internals.
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info,reqwest=warn,hyper=warn",
            1 => "debug,reqwest=warn,hyper=warn,ort=warn",
            _ => "trace,hyper=info,ort=info",
        }
    }

    /// Install the global subscriber
    ///
    /// `RUST_LOG` overrides the verbosity mapping when set and no explicit
    /// filter was configured.
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)?,
            None => EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(self.verbosity_to_filter()))?,
        };

        let registry = Registry::default().with(filter);

        match (&self.format, &self.output) {
            (TracingFormat::Console, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact()
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },

            (TracingFormat::Compact, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },

            #[cfg(feature = "tracing-json")]
            (TracingFormat::Json, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },

            #[cfg(feature = "tracing-files")]
            (format, TracingOutput::File(path)) => {
                let file_appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_name()
                        .unwrap_or_else(|| std::ffi::OsStr::new("car-dataset.log")),
                );

                match format {
                    TracingFormat::Console | TracingFormat::Compact => {
                        let fmt_layer = fmt::layer()
                            .with_ansi(false)
                            .with_writer(file_appender)
                            .compact();
                        registry.with(fmt_layer).try_init()?;
                    },
                    #[cfg(feature = "tracing-json")]
                    TracingFormat::Json => {
                        let fmt_layer = fmt::layer()
                            .json()
                            .with_writer(file_appender)
                            .with_current_span(true)
                            .with_span_list(true);
                        registry.with(fmt_layer).try_init()?;
                    },
                }
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "🚀 Dataset session started");
        }

        Ok(())
    }
}

/// Initialize tracing from CLI flags with a fresh session id
pub fn init_cli_tracing(
    verbosity: u8,
    format: TracingFormat,
    output: TracingOutput,
) -> anyhow::Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();

    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_output(output)
        .with_session_id(session_id)
        .init()
}

/// Span helpers for the long-running stages
pub mod spans {
    use tracing::{Level, Span};

    pub fn acquisition(root: &std::path::Path, subjects: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "acquisition",
            root = %root.display(),
            subjects = subjects
        )
    }

    pub fn annotation(root: &std::path::Path, model: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "annotation",
            root = %root.display(),
            model = %model.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        let filter = |v| TracingConfig::new().with_verbosity(v).verbosity_to_filter();
        assert!(filter(0).starts_with("info"));
        assert!(filter(1).starts_with("debug"));
        assert!(filter(2).starts_with("trace"));
        assert_eq!(filter(2), filter(9));
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("car_dataset=trace")
            .with_session_id("test-session");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("car_dataset=trace"));
        assert_eq!(config.session_id.as_deref(), Some("test-session"));
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert_eq!(config.output, TracingOutput::Console);
        assert!(config.env_filter.is_none());
    }
}
