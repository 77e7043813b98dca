//! Verification settings loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the operational setup: the six standard bins, a 0.1 mm trace threshold,
//! 2-member agreement and a 5-year ARI threshold. This is the only module
//! that looks at the environment; everything else takes explicit settings.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregate::windows::WindowSettings;
use crate::bins::BinTable;
use crate::classify::ThresholdClassifier;
use crate::exceedance::ari::{DEFAULT_ARI_THRESHOLD_YEARS, STANDARD_RETURN_PERIODS};
use crate::exceedance::climatology::DEFAULT_AGREEMENT_THRESHOLD;
use crate::logging::LogSettings;
use crate::model::{BinKind, RainfallBin, VerifyError, TRACE_THRESHOLD_MM};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "PRECIP_VERIFY_CONFIG";

// ---------------------------------------------------------------------------
// Bin entries
// ---------------------------------------------------------------------------

/// One `[[bins]]` entry. `hi` omitted means open-ended; `kind = "total"`
/// takes neither edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    pub name: String,
    #[serde(default = "default_bin_kind")]
    pub kind: BinKind,
    #[serde(default)]
    pub lo: Option<f64>,
    #[serde(default)]
    pub hi: Option<f64>,
}

fn default_bin_kind() -> BinKind {
    BinKind::Magnitude
}

impl BinConfig {
    fn to_bin(&self) -> Result<RainfallBin, VerifyError> {
        match self.kind {
            BinKind::Total => {
                if self.lo.is_some() || self.hi.is_some() {
                    return Err(VerifyError::InvalidBinTable(format!(
                        "total bin '{}' takes no lo/hi edges",
                        self.name
                    )));
                }
                Ok(RainfallBin::total(&self.name))
            }
            BinKind::Magnitude => {
                let lo = self.lo.ok_or_else(|| {
                    VerifyError::InvalidBinTable(format!("bin '{}' has no lower edge", self.name))
                })?;
                Ok(RainfallBin::magnitude(&self.name, lo, self.hi.unwrap_or(f64::INFINITY)))
            }
        }
    }
}

impl From<&RainfallBin> for BinConfig {
    fn from(bin: &RainfallBin) -> Self {
        BinConfig {
            name: bin.name.clone(),
            kind: bin.kind,
            lo: (bin.kind == BinKind::Magnitude).then_some(bin.lo),
            hi: (bin.kind == BinKind::Magnitude && !bin.is_open_ended()).then_some(bin.hi),
        }
    }
}

fn default_bins() -> Vec<BinConfig> {
    BinTable::standard().iter().map(BinConfig::from).collect()
}

fn default_trace_threshold() -> f64 {
    TRACE_THRESHOLD_MM
}

fn default_agreement_threshold() -> usize {
    DEFAULT_AGREEMENT_THRESHOLD
}

fn default_ari_threshold_years() -> f64 {
    DEFAULT_ARI_THRESHOLD_YEARS
}

fn default_return_periods() -> Vec<f64> {
    STANDARD_RETURN_PERIODS.to_vec()
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_trace_threshold")]
    pub trace_threshold: f64,
    #[serde(default = "default_bins")]
    pub bins: Vec<BinConfig>,
    #[serde(default = "default_agreement_threshold")]
    pub agreement_threshold: usize,
    #[serde(default = "default_ari_threshold_years")]
    pub ari_threshold_years: f64,
    #[serde(default = "default_return_periods")]
    pub ari_return_periods: Vec<f64>,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        VerificationConfig {
            trace_threshold: default_trace_threshold(),
            bins: default_bins(),
            agreement_threshold: default_agreement_threshold(),
            ari_threshold_years: default_ari_threshold_years(),
            ari_return_periods: default_return_periods(),
            window: WindowSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

impl VerificationConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, VerifyError> {
        let config: VerificationConfig = toml::from_str(content)
            .map_err(|e| VerifyError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `.env` if present, then loads the file named by
    /// `PRECIP_VERIFY_CONFIG`. Defaults when the variable is unset.
    pub fn from_env() -> Result<Self, VerifyError> {
        dotenv::dotenv().ok();
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) => load_config(PathBuf::from(path)),
            Err(_) => Ok(VerificationConfig::default()),
        }
    }

    pub fn validate(&self) -> Result<(), VerifyError> {
        if !(self.trace_threshold.is_finite() && self.trace_threshold > 0.0) {
            return Err(VerifyError::Config(format!(
                "trace_threshold must be positive, got {}",
                self.trace_threshold
            )));
        }
        if self.agreement_threshold == 0 {
            return Err(VerifyError::Config("agreement_threshold must be at least 1".into()));
        }
        if !(self.ari_threshold_years.is_finite() && self.ari_threshold_years > 0.0) {
            return Err(VerifyError::Config("ari_threshold_years must be positive".into()));
        }
        if self.ari_return_periods.len() < 2 || self.ari_return_periods.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(VerifyError::Config(
                "ari_return_periods needs at least two strictly increasing values".into(),
            ));
        }
        self.window.validate()?;
        let table = self.bin_table()?;
        // Trace values must never land inside a magnitude bin.
        if let Some(first) = table.iter().find(|b| b.kind == BinKind::Magnitude) {
            if self.trace_threshold > first.lo {
                return Err(VerifyError::Config(format!(
                    "trace_threshold {} exceeds the lower edge {} of bin '{}'",
                    self.trace_threshold, first.lo, first.name
                )));
            }
        }
        Ok(())
    }

    /// Builds and validates the bin table.
    pub fn bin_table(&self) -> Result<BinTable, VerifyError> {
        let bins = self
            .bins
            .iter()
            .map(BinConfig::to_bin)
            .collect::<Result<Vec<_>, _>>()?;
        BinTable::new(bins)
    }

    pub fn classifier(&self) -> ThresholdClassifier {
        ThresholdClassifier::new(self.trace_threshold)
    }
}

/// Loads and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<VerificationConfig, VerifyError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| VerifyError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    let config = VerificationConfig::from_toml_str(&content)?;
    info!(path = %path.display(), bins = config.bins.len(), "loaded verification config");
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
