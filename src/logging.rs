//! Tracing setup.
//!
//! Terminal verbosity is WARN by default, INFO with `-v`, DEBUG with `-d`,
//! ERROR with `-q` and off with `-s`. `RUST_LOG` applies only when none of
//! those flags is given. An optional log file always receives DEBUG.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

const CRATE_TARGET: &str = "execbox";

/// Log output format
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Colored human-readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Default, Clone)]
pub struct TracingConfig {
    pub verbose: bool,
    pub debug: bool,
    pub quiet: bool,
    pub silent: bool,
    pub format: LogFormat,
    pub log_file: Option<PathBuf>,
}

impl TracingConfig {
    /// Terminal level, None when silenced
    fn terminal_level(&self) -> Option<Level> {
        if self.silent {
            None
        } else if self.quiet {
            Some(Level::ERROR)
        } else if self.debug {
            Some(Level::DEBUG)
        } else if self.verbose {
            Some(Level::INFO)
        } else {
            Some(Level::WARN)
        }
    }

    fn level_flag_given(&self) -> bool {
        self.verbose || self.debug || self.quiet || self.silent
    }
}

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn crate_filter(level: Level) -> EnvFilter {
    EnvFilter::new(format!("{}={},warn", CRATE_TARGET, level.as_str().to_lowercase()))
}

fn terminal_layer(format: &LogFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(config: TracingConfig) {
    if TRACING_INITIALIZED.get().is_some() {
        return;
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if let Some(log_path) = &config.log_file {
        match std::fs::File::create(log_path) {
            Ok(file) => layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(file)
                    .with_filter(crate_filter(Level::DEBUG))
                    .boxed(),
            ),
            Err(e) => {
                // No subscriber yet, so this can't go through tracing
                eprintln!("Warning: Failed to create log file {:?}: {}", log_path, e);
            }
        }
    }

    if let Some(level) = config.terminal_level() {
        let filter = if config.level_flag_given() {
            crate_filter(level)
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| crate_filter(level))
        };
        layers.push(terminal_layer(&config.format, filter));
    }

    if layers.is_empty() {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
    } else {
        let _ = tracing_subscriber::registry().with(layers).try_init();
    }

    let _ = TRACING_INITIALIZED.set(());
}
