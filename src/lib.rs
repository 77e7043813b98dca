//! Categorical verification of gridded precipitation forecasts.
//!
//! Forecast and observed accumulations are classified per rainfall bin
//! ([`classify`]) or by exceedance of a climatology / return-period
//! reference ([`exceedance`]), reduced to contingency tables ([`table`]),
//! and averaged over weeks, months or lead days ([`aggregate`]).

pub mod aggregate;
pub mod bins;
pub mod classify;
pub mod config;
pub mod exceedance;
pub mod export;
pub mod grid;
pub mod logging;
pub mod model;
pub mod scalar;
pub mod table;
pub mod verify;

pub use bins::BinTable;
pub use classify::ThresholdClassifier;
pub use config::VerificationConfig;
pub use model::{Category, ContingencyCount, RainfallBin, SkillScores, VerifyError};
pub use table::TableRow;
