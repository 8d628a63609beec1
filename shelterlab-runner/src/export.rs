//! Calibration export: threshold map as JSON, subgroup report as CSV.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::calibrate::{Calibration, SubgroupReport, ThresholdMap};

pub const THRESHOLDS_FILE: &str = "thresholds.json";
pub const REPORT_FILE: &str = "subgroup_report.csv";

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_thresholds_json(map: &ThresholdMap) -> Result<String> {
    serde_json::to_string_pretty(map).context("failed to serialize threshold map to JSON")
}

pub fn import_thresholds_json(json: &str) -> Result<ThresholdMap> {
    serde_json::from_str(json).context("failed to deserialize threshold map from JSON")
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Columns: dimension, subgroup, n_rows, n_positive, threshold, skipped,
/// f1_before, f1_after, f2_before, f2_after. Empty `threshold` means the
/// subgroup kept the default cutoff.
pub fn export_report_csv<'a>(reports: impl IntoIterator<Item = &'a SubgroupReport>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "dimension",
        "subgroup",
        "n_rows",
        "n_positive",
        "threshold",
        "skipped",
        "f1_before",
        "f1_after",
        "f2_before",
        "f2_after",
    ])?;
    for r in reports {
        wtr.write_record([
            r.dimension.clone(),
            r.subgroup.clone(),
            r.n_rows.to_string(),
            r.n_positive.to_string(),
            r.threshold.map(|t| format!("{t:.6}")).unwrap_or_default(),
            r.skipped.map(|s| s.to_string()).unwrap_or_default(),
            format!("{:.6}", r.f1_before),
            format!("{:.6}", r.f1_after),
            format!("{:.6}", r.f2_before),
            format!("{:.6}", r.f2_after),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Bundle ─────────────────────────────────────────────────────────

/// Write `thresholds.json` and `subgroup_report.csv` under `output_dir`.
pub fn save_calibration(calibration: &Calibration, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let thresholds = output_dir.join(THRESHOLDS_FILE);
    std::fs::write(&thresholds, export_thresholds_json(&calibration.thresholds)?)
        .with_context(|| format!("failed to write {}", thresholds.display()))?;

    let report = output_dir.join(REPORT_FILE);
    std::fs::write(&report, export_report_csv(calibration.reports())?)
        .with_context(|| format!("failed to write {}", report.display()))?;

    log::info!("calibration written to {}", output_dir.display());
    Ok(vec![thresholds, report])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::SubgroupCalibrator;

    fn calibration() -> Calibration {
        let members: Vec<String> = ["a", "a", "b", "b"].iter().map(|s| s.to_string()).collect();
        SubgroupCalibrator::default()
            .calibrate(&[0.2, 0.7, 0.3, 0.9], &[0, 0, 0, 1], &[("g", members.as_slice())])
            .unwrap()
    }

    #[test]
    fn report_has_one_row_per_subgroup() {
        let csv = export_report_csv(calibration().reports()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("dimension,subgroup"));
        assert!(lines[1].starts_with("g,a,2,0,,no positive examples,"));
        assert!(lines[2].starts_with("g,b,2,1,0.900000,,"));
    }

    #[test]
    fn bundle_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let cal = calibration();
        let paths = save_calibration(&cal, &dir.path().join("out")).unwrap();
        assert_eq!(paths.len(), 2);
        let json = std::fs::read_to_string(&paths[0]).unwrap();
        let map = import_thresholds_json(&json).unwrap();
        assert_eq!(map.get("g", "b"), Some(0.9));
        assert_eq!(map.get("g", "a"), None);
    }
}
