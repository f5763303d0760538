// src/quota/report.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::WriterBuilder;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::config::{Country, DemographicVariable, QuotaTarget};
use crate::quota::aggregate::CountryAggregate;

/// Identifier written in both key columns of the trailing sample-size row.
pub const SAMPLE_SIZE_ID: &str = "sample_size";

pub const COL_VARIABLE: &str = "Demographic Variable";
pub const COL_CATEGORY: &str = "Category";

/// One quota row with its target and observed cell per country.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub variable: DemographicVariable,
    pub category: String,
    /// Aligned with `QuotaReport::countries`.
    pub quotas: Vec<Option<f64>>,
    /// Aligned with `QuotaReport::countries`.
    pub observed: Vec<Option<f64>>,
}

/// Quota table plus observed columns, followed by the sample-size row.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaReport {
    pub countries: Vec<Country>,
    /// Demographic rows in quota table order.
    pub rows: Vec<ReportRow>,
    /// Valid responses per country; serialized as the last row.
    pub sample_sizes: Vec<usize>,
}

/// An observed proportion further from its target than the tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct Deviation {
    pub country: Country,
    pub variable: DemographicVariable,
    pub category: String,
    pub quota: f64,
    pub observed: f64,
}

impl QuotaReport {
    pub fn header(&self) -> Vec<String> {
        let mut h = vec![COL_VARIABLE.to_string(), COL_CATEGORY.to_string()];
        h.extend(self.countries.iter().map(|c| format!("{} quota", c)));
        h.extend(self.countries.iter().map(|c| format!("{} data", c)));
        h
    }

    pub fn column_count(&self) -> usize {
        2 + 2 * self.countries.len()
    }

    /// Serialized row count, sample-size row included.
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    /// All serialized records in output order; the sample-size row is last.
    pub fn records(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.row_count());
        for row in &self.rows {
            let mut rec = vec![row.variable.to_string(), row.category.clone()];
            rec.extend(row.quotas.iter().map(|v| format_cell(*v)));
            rec.extend(row.observed.iter().map(|v| format_cell(*v)));
            out.push(rec);
        }

        let mut sample = vec![SAMPLE_SIZE_ID.to_string(), SAMPLE_SIZE_ID.to_string()];
        sample.extend(self.countries.iter().map(|_| String::new()));
        sample.extend(self.sample_sizes.iter().map(|n| n.to_string()));
        out.push(sample);
        out
    }

    /// Cells whose observed share misses the target by more than `tolerance`.
    pub fn deviations(&self, tolerance: f64) -> Vec<Deviation> {
        let mut out = Vec::new();
        for row in &self.rows {
            for (i, country) in self.countries.iter().enumerate() {
                if let (Some(quota), Some(observed)) = (row.quotas[i], row.observed[i]) {
                    if (observed - quota).abs() > tolerance + f64::EPSILON {
                        out.push(Deviation {
                            country: *country,
                            variable: row.variable,
                            category: row.category.clone(),
                            quota,
                            observed,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Proportions print as plain decimals with at least one fractional digit; null is empty.
fn format_cell(v: Option<f64>) -> String {
    match v {
        Some(x) if x.fract() == 0.0 => format!("{:.1}", x),
        Some(x) => format!("{}", x),
        None => String::new(),
    }
}

/// Join quota targets with each country's observed proportions.
pub fn assemble(quotas: &[QuotaTarget], aggregates: &[CountryAggregate]) -> QuotaReport {
    let countries: Vec<Country> = aggregates.iter().map(|a| a.country).collect();

    let rows = quotas
        .iter()
        .map(|q| ReportRow {
            variable: q.variable,
            category: q.category.clone(),
            quotas: countries.iter().map(|c| q.target(*c)).collect(),
            observed: aggregates
                .iter()
                .map(|a| a.observed(q.variable, &q.category))
                .collect(),
        })
        .collect();

    QuotaReport {
        countries,
        rows,
        sample_sizes: aggregates.iter().map(|a| a.sample_size).collect(),
    }
}

/// `<dir>/quotacheck_<DDMMYY>.csv`
pub fn report_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("quotacheck_{}.csv", date.format("%d%m%y")))
}

/// Write the report as CSV. Goes through a temp file, so a failure leaves nothing behind.
/// An existing report at `path` is replaced.
pub fn write_report(report: &QuotaReport, path: &Path) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("creating report directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "quotacheck.csv".to_string());
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    if path.exists() {
        warn!(path = %path.display(), "overwriting existing report");
    }
    if let Err(e) = write_and_rename(report, &tmp_path, path) {
        if tmp_path.exists() {
            if let Err(rm) = fs::remove_file(&tmp_path) {
                warn!(path = %tmp_path.display(), error = %rm, "could not remove temp report");
            }
        }
        return Err(e);
    }

    info!(path = %path.display(), rows = report.row_count(), "wrote quota report");
    Ok(())
}

fn write_and_rename(report: &QuotaReport, tmp_path: &Path, path: &Path) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .from_path(tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    wtr.write_record(report.header())?;
    for rec in report.records() {
        wtr.write_record(&rec)?;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", tmp_path.display()))?;
    drop(wtr);

    fs::rename(tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::quota::aggregate::country_proportions;
    use crate::survey::fixtures::{export_with, valid_response};
    use crate::survey::{Demographics, SurveyExport};
    use anyhow::Result;
    use tempfile::tempdir;

    fn study_report() -> QuotaReport {
        let cfg = Config::study_default();
        let aggregates: Vec<CountryAggregate> = cfg
            .countries
            .iter()
            .map(|c| {
                let valid = match c.country {
                    Country::US => export_with(
                        Country::US,
                        DemographicVariable::Gender,
                        &[(Some("male"), 49), (Some("female"), 51)],
                    ),
                    Country::CH => export_with(
                        Country::CH,
                        DemographicVariable::ChRegion,
                        &[(Some("german"), 3), (Some("french"), 1)],
                    ),
                    Country::CN => SurveyExport {
                        country: Country::CN,
                        headers: Vec::new(),
                        rows: vec![valid_response(Demographics {
                            gender: Some("female".into()),
                            age: Some("65y_above".into()),
                            flying_plan: Some("no".into()),
                            ch_region: None,
                        })],
                    },
                };
                country_proportions(&valid, c, &cfg.quotas)
            })
            .collect();
        assemble(&cfg.quotas, &aggregates)
    }

    #[test]
    fn report_shape_for_three_countries() {
        let report = study_report();
        assert_eq!(report.rows.len(), 13);
        assert_eq!(report.column_count(), 8);
        assert_eq!(report.header().len(), 8);
        assert_eq!(report.row_count(), 14);
        assert_eq!(report.records().len(), 14);
        assert!(report.records().iter().all(|r| r.len() == 8));
        assert_eq!(
            report.header(),
            vec![
                "Demographic Variable",
                "Category",
                "US quota",
                "CH quota",
                "CN quota",
                "US data",
                "CH data",
                "CN data"
            ]
        );
    }

    #[test]
    fn sample_size_row_is_last_with_exact_counts() {
        let report = study_report();
        assert_eq!(report.sample_sizes, vec![100, 4, 1]);
        let records = report.records();
        let last = records.last().unwrap();
        assert_eq!(
            last,
            &vec!["sample_size", "sample_size", "", "", "", "100", "4", "1"]
        );
    }

    #[test]
    fn cells_keep_null_and_zero_apart() {
        let report = study_report();
        let row = |cat: &str| report.rows.iter().find(|r| r.category == cat).unwrap();

        // US/CN have no regional quota at all
        assert_eq!(row("romansch").observed, vec![None, Some(0.0), None]);
        assert_eq!(row("german").observed, vec![None, Some(0.75), None]);
        // CN folds its top age bracket
        assert_eq!(row("55y_64y").observed[2], Some(1.0));
        assert_eq!(row("65y_above").observed[2], None);
        assert_eq!(row("65y_above").quotas, vec![Some(0.19), Some(0.18), None]);
        assert_eq!(row("male").observed[0], Some(0.49));
    }

    #[test]
    fn deviations_respect_tolerance() {
        let report = study_report();
        let devs = report.deviations(0.05);
        assert!(devs
            .iter()
            .any(|d| d.country == Country::CN && d.category == "55y_64y"));
        assert!(!devs
            .iter()
            .any(|d| d.country == Country::US && d.variable == DemographicVariable::Gender));
        assert!(devs.iter().all(|d| (d.observed - d.quota).abs() > 0.05));
    }

    #[test]
    fn formats_cells() {
        assert_eq!(format_cell(Some(0.49)), "0.49");
        assert_eq!(format_cell(Some(1.0)), "1.0");
        assert_eq!(format_cell(Some(0.0)), "0.0");
        assert_eq!(format_cell(None), "");
    }

    #[test]
    fn report_path_embeds_ddmmyy() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 3).unwrap();
        assert_eq!(
            report_path(Path::new("reports"), date),
            PathBuf::from("reports/quotacheck_031224.csv")
        );
    }

    #[test]
    fn failed_rename_removes_temp_file() -> Result<()> {
        let dir = tempdir()?;
        let path = report_path(dir.path(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        // a non-empty directory at the target makes the rename fail
        fs::create_dir_all(path.join("occupied"))?;

        let err = write_report(&study_report(), &path).unwrap_err();
        assert!(format!("{err:#}").contains("renaming"), "{err:#}");

        let names: Vec<String> = fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["quotacheck_010124.csv".to_string()]);
        assert!(path.is_dir());
        Ok(())
    }

    #[test]
    fn writes_and_overwrites_report() -> Result<()> {
        let dir = tempdir()?;
        let path = report_path(&dir.path().join("out"), NaiveDate::from_ymd_opt(2024, 11, 29).unwrap());
        let report = study_report();

        write_report(&report, &path)?;
        write_report(&report, &path)?;

        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 15);
        assert_eq!(
            lines[0],
            "Demographic Variable,Category,US quota,CH quota,CN quota,US data,CH data,CN data"
        );
        assert_eq!(lines[1], "gender,male,0.49,0.5,0.51,0.49,0.0,0.0");
        assert_eq!(lines[14], "sample_size,sample_size,,,,100,4,1");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }
}
