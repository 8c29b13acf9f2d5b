//! CSV report writer.
//!
//! Files written into the output directory:
//! - `npv_cube.csv`: one row per (trade, date, sample) plus the t0 row
//! - `exposure_trade_<id>.csv`: uncollateralised trade profiles
//! - `exposure_nettingset_<id>.csv`: netting set profiles after collateral
//! - `xva.csv`: netting set, counterparty and portfolio adjustments
//! - `exposure_allocated.csv`, `xva_allocated.csv`: trade shares of the
//!   netted profiles and charges, when allocation is on
//! - `valuation_errors.csv`: per-trade failures collected during the run
//!
//! Ids that map to the same file name (`A/B` and `A_B`) get a numeric suffix
//! in the order they are written, so no report overwrites another.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commands::run::RunOutput;
use crate::config::OutputConfig;
use crate::Result;

/// Paths of the files written by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFiles(Vec<PathBuf>);

impl ReportFiles {
    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Writes every report of `output` into `settings.dir`, creating it if needed.
pub fn write_reports(output: &RunOutput, settings: &OutputConfig) -> Result<ReportFiles> {
    let dir = settings.dir.as_path();
    std::fs::create_dir_all(dir)?;
    let mut files = ReportFiles::default();

    if settings.write_cube {
        files.0.push(write_csv(&dir.join("npv_cube.csv"), output.cube.records())?);
    }
    if settings.write_trade_profiles {
        let mut stems = StemAllocator::default();
        for profile in &output.trade_profiles {
            let name = format!("exposure_trade_{}.csv", stems.allocate(profile.id()));
            files.0.push(write_csv(&dir.join(name), profile.records())?);
        }
    }
    let mut stems = StemAllocator::default();
    for profile in &output.netting_set_profiles {
        let name = format!("exposure_nettingset_{}.csv", stems.allocate(profile.id()));
        files.0.push(write_csv(&dir.join(name), profile.records())?);
    }
    files.0.push(write_csv(&dir.join("xva.csv"), output.xva.records())?);
    if !output.allocations.is_empty() {
        files.0.push(write_csv(
            &dir.join("exposure_allocated.csv"),
            output.allocations.iter().flat_map(|a| a.records()),
        )?);
        files.0.push(write_csv(
            &dir.join("xva_allocated.csv"),
            output.allocations.iter().map(|a| a.xva_record()),
        )?);
    }
    files.0.push(write_csv(
        &dir.join("valuation_errors.csv"),
        output.valuation_report.rows(),
    )?);

    info!(files = files.len(), dir = %dir.display(), "Reports written");
    Ok(files)
}

/// Serialises `rows` with a header taken from the first row.
pub fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0usize;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = count, "CSV written");
    Ok(path.to_path_buf())
}

/// Identifier made safe for use in a file name.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Hands out file stems, suffixing ids whose stem is already taken.
///
/// Stems compare case-insensitively so distinct files survive on
/// case-insensitive file systems.
#[derive(Debug, Default)]
struct StemAllocator {
    taken: HashSet<String>,
}

impl StemAllocator {
    fn allocate(&mut self, id: &str) -> String {
        let base = file_stem(id);
        let mut stem = base.clone();
        let mut k = 2;
        while !self.taken.insert(stem.to_ascii_lowercase()) {
            stem = format!("{}_{}", base, k);
            k += 1;
        }
        if stem != base {
            warn!(id, file_stem = %stem, "Report file name already used, suffix added");
        }
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        id: &'static str,
        value: Option<f64>,
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("NS-1_a"), "NS-1_a");
        assert_eq!(file_stem("EQ/SPX fwd"), "EQ_SPX_fwd");
    }

    #[test]
    fn test_clashing_ids_get_distinct_stems() {
        let mut stems = StemAllocator::default();
        assert_eq!(stems.allocate("A_B"), "A_B");
        assert_eq!(stems.allocate("A/B"), "A_B_2");
        assert_eq!(stems.allocate("A B"), "A_B_3");
        assert_eq!(stems.allocate("a_b"), "a_b_4");
        assert_eq!(stems.allocate("NS1"), "NS1");
    }

    #[test]
    fn test_write_csv_header_and_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_csv(
            &path,
            vec![
                Row {
                    id: "A",
                    value: Some(1.5),
                },
                Row {
                    id: "B",
                    value: None,
                },
            ],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["id,value", "A,1.5", "B,"]);
    }
}
