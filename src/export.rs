//! CSV and JSON renderings of verification output.
//!
//! Undefined scores are empty in JSON (`null`) and `NaN` in CSV, so that
//! spreadsheet and dataframe readers load them as missing values.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::exceedance::ExceedanceRow;
use crate::model::VerifyError;
use crate::table::TableRow;

const TABLE_HEADER: &str = "category,hit,false_alarm,miss,correct_negative,fcst_yes,fcst_no,\
obs_yes,obs_no,total_obs,total_fcst,pod,far,sr,csi,bias,pcr";

const EXCEEDANCE_HEADER: &str = "step,hits,miss,false_alarm,non_event,bias,pod,far,sr,csi,pcr";

/// Quotes a text field when it holds a separator, quote or line break.
fn text_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NaN".to_string(),
    }
}

pub fn rows_to_csv(rows: &[TableRow]) -> String {
    let mut out = String::from(TABLE_HEADER);
    out.push('\n');
    for r in rows {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            text_field(&r.category),
            r.hit,
            r.false_alarm,
            r.miss,
            r.correct_negative,
            r.fcst_yes,
            r.fcst_no,
            r.obs_yes,
            r.obs_no,
            r.total_obs,
            r.total_fcst,
            cell(r.pod),
            cell(r.far),
            cell(r.sr),
            cell(r.csi),
            cell(r.bias),
            cell(r.pcr),
        );
    }
    out
}

/// One line per step, scores rounded to three decimals.
pub fn exceedance_rows_to_csv(rows: &[ExceedanceRow]) -> String {
    let mut out = String::from(EXCEEDANCE_HEADER);
    out.push('\n');
    for row in rows {
        let r = row.rounded();
        let s = r.scores;
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            r.step,
            r.hits,
            r.miss,
            r.false_alarm,
            r.non_event,
            cell(s.bias),
            cell(s.pod),
            cell(s.far),
            cell(s.sr),
            cell(s.csi),
            cell(s.pcr),
        );
    }
    out
}

pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String, VerifyError> {
    serde_json::to_string_pretty(value).map_err(|e| VerifyError::Config(format!("JSON encoding failed: {}", e)))
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_output(path: &Path, contents: &str) -> Result<(), VerifyError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| VerifyError::Config(format!("cannot create {}: {}", parent.display(), e)))?;
    }
    fs::write(path, contents).map_err(|e| VerifyError::Config(format!("cannot write {}: {}", path.display(), e)))
}
