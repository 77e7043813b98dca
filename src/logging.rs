/// Structured logging for the verification engine
///
/// Installs a `tracing` subscriber (console, optionally JSON, optionally
/// mirrored to an append-mode file) and classifies engine failures so that
/// routine gaps in the data do not drown out real problems.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

use crate::model::VerifyError;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"precip_verification=debug"`.
    pub level: String,
    /// Newline-delimited JSON on the console.
    pub json: bool,
    /// Plain-text copy of every event, appended.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Installs the global subscriber. Only the first call in a process takes
/// effect; later calls still validate the settings.
pub fn init_logging(settings: &LogSettings) -> Result<(), VerifyError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| VerifyError::Config(format!("invalid log level '{}': {}", settings.level, e)))?,
    };

    let file_layer = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| VerifyError::Config(format!("cannot open log file {}: {}", path.display(), e)))?;
            Some(fmt_layer::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt_layer::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt_layer::layer().with_target(false))
            .try_init()
            .ok();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Routine: a score with no events to score
    Expected,
    /// Bad input or configuration; the operation cannot be trusted
    Unexpected,
    /// Data gap or suspect reference data worth a look
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

pub fn classify_failure(err: &VerifyError) -> FailureType {
    match err {
        VerifyError::UndefinedScore { .. } => FailureType::Expected,
        VerifyError::MissingPeriodData { .. }
        | VerifyError::EmptyWindow { .. }
        | VerifyError::NonMonotonicReferenceTable { .. } => FailureType::Unknown,
        VerifyError::ShapeMismatch { .. } | VerifyError::InvalidBinTable(_) | VerifyError::Config(_) => {
            FailureType::Unexpected
        }
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Logs a failed period at the level its classification calls for.
pub fn log_period_failure(period: &str, err: &VerifyError) {
    let failure_type = classify_failure(err);
    match failure_type {
        FailureType::Expected => debug!(period, failure = %failure_type, "{}", err),
        FailureType::Unexpected => error!(period, failure = %failure_type, "{}", err),
        FailureType::Unknown => warn!(period, failure = %failure_type, "period skipped: {}", err),
    }
}

/// Reports how many periods of a window were usable.
pub fn log_window_summary(window: &str, total: usize, used: usize) {
    let skipped = total.saturating_sub(used);
    if skipped == 0 {
        info!(window, used, total, "window complete");
    } else if used == 0 {
        error!(window, used, total, "window has no usable periods");
    } else {
        warn!(window, used, skipped, total, "window complete with skipped periods");
    }
}
