// src/pipeline.rs

use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::clean::{assign_ids, write_clean};
use crate::config::{Config, Country, CountryConfig};
use crate::quota::{
    assemble, country_proportions, report_path, write_report, CountryAggregate, QuotaReport,
};
use crate::survey::{filter_with_stats, load_export, FilterStats, SurveyExport};

/// Everything derived for one country in a run.
#[derive(Debug, Clone)]
pub struct CountryRun {
    pub valid: SurveyExport,
    pub stats: FilterStats,
    pub aggregate: CountryAggregate,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report_path: PathBuf,
    pub report: QuotaReport,
    pub valid_counts: Vec<(Country, usize)>,
    pub clean_paths: Vec<PathBuf>,
}

/// Load, filter and aggregate one country.
pub fn process_country(cfg: &CountryConfig, config: &Config) -> Result<CountryRun> {
    let raw = load_export(cfg)?;
    let (valid, stats) = filter_with_stats(&raw, cfg);
    if valid.is_empty() {
        warn!(country = %cfg.country, "no valid responses; proportions will be zero");
    }
    let aggregate = country_proportions(&valid, cfg, &config.quotas);
    Ok(CountryRun {
        valid,
        stats,
        aggregate,
    })
}

/// Run the quota check for every configured country and write the dated report.
#[tracing::instrument(level = "info", skip(config), fields(countries = config.countries.len()))]
pub fn run(config: &Config, run_date: NaiveDate) -> Result<RunSummary> {
    // ─── 1) per-country load, filter, aggregate ──────────────────────
    let mut runs = Vec::with_capacity(config.countries.len());
    for cfg in &config.countries {
        runs.push(process_country(cfg, config)?);
    }

    // ─── 2) assemble + persist report ────────────────────────────────
    let aggregates: Vec<CountryAggregate> = runs.iter().map(|r| r.aggregate.clone()).collect();
    let report = assemble(&config.quotas, &aggregates);
    for d in report.deviations(config.tolerance) {
        warn!(
            country = %d.country,
            variable = %d.variable,
            category = %d.category,
            quota = d.quota,
            observed = d.observed,
            "off quota"
        );
    }
    let path = report_path(&config.output_dir, run_date);
    write_report(&report, &path)?;

    // ─── 3) optional clean exports ───────────────────────────────────
    let mut clean_paths = Vec::new();
    if let Some(clean) = &config.clean {
        let blocks = assign_ids(runs.iter().map(|r| &r.valid));
        for (r, block) in runs.iter().zip(&blocks) {
            clean_paths.push(write_clean(&r.valid, block, clean)?);
        }
    }

    let valid_counts = runs
        .iter()
        .map(|r| (r.valid.country, r.stats.kept))
        .collect();
    info!(report = %path.display(), "quota check complete");

    Ok(RunSummary {
        report_path: path,
        report,
        valid_counts,
        clean_paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CleanConfig, CleanFormat};
    use crate::survey::fixtures::init_test_logging;
    use anyhow::Result;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const HEADER: &str =
        "StartDate,DistributionChannel,Finished,screened_out,Q_TerminateFlag,gender,age,flying_plan,plan,ch_region";
    const PREAMBLE: &str = "Start Date,Distribution Channel,Finished,screened_out,Q_TerminateFlag,Gender,Age,Flying plan,Plan,Region\n\
{\"ImportId\":\"startDate\"},{\"ImportId\":\"distributionChannel\"},{\"ImportId\":\"finished\"},x,x,x,x,x,x,x\n";

    fn write_export(dir: &Path, name: &str, rows: &[&str]) -> Result<PathBuf> {
        let path = dir.join(name);
        let mut text = format!("{HEADER}\n{PREAMBLE}");
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        fs::write(&path, text)?;
        Ok(path)
    }

    fn study_config(dir: &Path) -> Result<Config> {
        let us = write_export(
            dir,
            "us.csv",
            &[
                "2024-12-01,anonymous,True,,,male,18y_24y,,no,",
                "2024-12-01,anonymous,True,,,female,25y_34y,,yes,",
                "2024-12-01,anonymous,True,false,,female,25y_34y,,no,",
                "2024-12-01,preview,True,,,male,18y_24y,,no,",
                "2024-12-01,anonymous,False,,,male,18y_24y,,no,",
                "2024-12-01,anonymous,True,true_trap1,,male,18y_24y,,no,",
                "2024-12-01,anonymous,True,,QuotaMet,male,18y_24y,,no,",
            ],
        )?;
        let ch = write_export(
            dir,
            "ch.csv",
            &[
                "2024-12-01,anonymous,True,,,male,45y_54y,no,,german",
                "2024-12-01,anonymous,True,,,female,45y_54y,yes,,german",
                "2024-12-01,anonymous,True,,,female,55y_64y,no,,french",
                "2024-12-01,anonymous,True,,,male,65y_above,yes,,german",
                "2024-12-01,anonymous,True,true_region,,male,65y_above,yes,,",
            ],
        )?;
        let cn = write_export(
            dir,
            "cn.csv",
            &[
                "2024-12-01,anonymous,True,,,male,55y_64y,no,,",
                "2024-12-01,anonymous,True,,,female,65y_above,yes,,",
                "2024-12-01,anonymous,True,,,female,35y_44y,yes,,",
                "2024-12-01,anonymous,True,,Screened,female,35y_44y,yes,,",
            ],
        )?;

        let mut config = Config::study_default();
        config.output_dir = dir.join("reports");
        config.clean = Some(CleanConfig {
            dir: dir.join("clean"),
            format: CleanFormat::Csv,
        });
        for c in &mut config.countries {
            c.source = match c.country {
                Country::US => us.clone(),
                Country::CH => ch.clone(),
                Country::CN => cn.clone(),
            };
        }
        config
            .countries
            .iter_mut()
            .find(|c| c.country == Country::US)
            .unwrap()
            .columns
            .insert(crate::config::DemographicVariable::FlyingPlan, "plan".into());
        Ok(config)
    }

    #[test]
    fn end_to_end_three_countries() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let config = study_config(dir.path())?;
        let date = NaiveDate::from_ymd_opt(2024, 12, 11).unwrap();

        let summary = run(&config, date)?;

        assert_eq!(
            summary.valid_counts,
            vec![(Country::US, 3), (Country::CH, 4), (Country::CN, 3)]
        );
        assert!(summary.report_path.ends_with("quotacheck_111224.csv"));

        let text = fs::read_to_string(&summary.report_path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 15);
        // US: 1 male of 3, CH: 2 of 4, CN: 1 of 3
        assert_eq!(lines[1], "gender,male,0.49,0.5,0.51,0.33,0.5,0.33");
        // CN 55y_64y absorbs 65y_above: 0.33 + 0.33
        assert_eq!(lines[7], "age,55y_64y,0.17,0.18,0.34,0.0,0.25,0.66");
        assert_eq!(lines[8], "age,65y_above,0.19,0.18,,0.0,0.25,");
        // US reads flying_plan from its `plan` column
        assert_eq!(lines[9], "flying_plan,no,0.2,0.2,0.3,0.67,0.5,0.33");
        assert_eq!(lines[10], "ch_region,german,,0.73,,,0.75,");
        assert_eq!(lines[13], "ch_region,romansch,,,,,0.0,");
        assert_eq!(lines[14], "sample_size,sample_size,,,,3,4,3");

        assert_eq!(summary.clean_paths.len(), 3);
        let cn_clean = fs::read_to_string(dir.path().join("clean/data_clean_cn.csv"))?;
        let cn_lines: Vec<&str> = cn_clean.lines().collect();
        assert_eq!(cn_lines.len(), 4);
        assert!(cn_lines[0].ends_with(",id"));
        // ids continue after US (3) and CH (4)
        assert!(cn_lines[1].ends_with(",8"));
        assert!(cn_lines[3].ends_with(",10"));
        Ok(())
    }

    #[test]
    fn missing_source_aborts_without_report() -> Result<()> {
        let dir = tempdir()?;
        let mut config = study_config(dir.path())?;
        config.countries[1].source = dir.path().join("missing.csv");

        let err = run(&config, NaiveDate::from_ymd_opt(2024, 12, 11).unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("CH export"), "{err:#}");
        assert!(!dir.path().join("reports").exists());
        Ok(())
    }

    #[test]
    fn missing_column_is_fatal_for_country() -> Result<()> {
        let dir = tempdir()?;
        let mut config = study_config(dir.path())?;
        let us = config
            .countries
            .iter_mut()
            .find(|c| c.country == Country::US)
            .unwrap();
        us.columns
            .insert(crate::config::DemographicVariable::FlyingPlan, "flying_recent".into());

        let err = run(&config, NaiveDate::from_ymd_opt(2024, 12, 11).unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("flying_recent"), "{err:#}");
        Ok(())
    }
}
