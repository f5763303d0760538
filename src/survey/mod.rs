// src/survey/mod.rs
pub mod filter;
pub mod record;
pub mod utils;

#[cfg(test)]
pub(crate) mod fixtures;

pub use filter::{filter, filter_with_stats, ExclusionReason, FilterStats};
pub use record::{Demographics, RawResponse, SurveyExport};

use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::Read};
use tracing::{debug, info};

use crate::config::{CountryConfig, DemographicVariable};
use utils::{clean_str, non_empty, parse_finished};

pub const COL_DISTRIBUTION_CHANNEL: &str = "DistributionChannel";
pub const COL_FINISHED: &str = "Finished";
pub const COL_SCREENED_OUT: &str = "screened_out";
pub const COL_TERMINATE_FLAG: &str = "Q_TerminateFlag";

/// Rows between the header and the first response (question text, import ids).
pub const PREAMBLE_ROWS: usize = 2;

/// Header positions of every column a country's processing touches.
struct ColumnIndex {
    channel: usize,
    finished: usize,
    screened_out: usize,
    terminate_flag: usize,
    demographics: Vec<(DemographicVariable, usize)>,
}

impl ColumnIndex {
    /// Resolve all required columns, failing with the full list of missing ones.
    fn resolve(headers: &[String], cfg: &CountryConfig) -> Result<Self> {
        let mut missing = Vec::new();
        let mut find = |name: &str| -> usize {
            match headers.iter().position(|h| h == name) {
                Some(i) => i,
                None => {
                    missing.push(name.to_string());
                    usize::MAX
                }
            }
        };

        let channel = find(COL_DISTRIBUTION_CHANNEL);
        let finished = find(COL_FINISHED);
        let screened_out = find(COL_SCREENED_OUT);
        let terminate_flag = find(COL_TERMINATE_FLAG);
        let demographics: Vec<(DemographicVariable, usize)> = DemographicVariable::ALL
            .into_iter()
            .filter(|v| cfg.uses(*v))
            .map(|v| (v, find(cfg.column(v))))
            .collect();

        if !missing.is_empty() {
            bail!(
                "{} export is missing expected column(s): {}",
                cfg.country,
                missing.join(", ")
            );
        }

        Ok(Self {
            channel,
            finished,
            screened_out,
            terminate_flag,
            demographics,
        })
    }
}

/// Load one country's survey export from disk.
#[tracing::instrument(level = "info", skip(cfg), fields(country = %cfg.country, path = %cfg.source.display()))]
pub fn load_export(cfg: &CountryConfig) -> Result<SurveyExport> {
    let file = File::open(&cfg.source).with_context(|| {
        format!(
            "failed to open {} export {}",
            cfg.country,
            cfg.source.display()
        )
    })?;
    let export = read_export(file, cfg).with_context(|| {
        format!(
            "failed to read {} export {}",
            cfg.country,
            cfg.source.display()
        )
    })?;
    info!(rows = export.len(), "loaded export");
    Ok(export)
}

/// Parse an export: header row, `PREAMBLE_ROWS` metadata rows, then responses.
pub fn read_export<R: Read>(reader: R, cfg: &CountryConfig) -> Result<SurveyExport> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.records();
    let headers: Vec<String> = match records.next() {
        Some(rec) => rec
            .context("CSV parse error in header row")?
            .iter()
            .map(clean_str)
            .collect(),
        None => bail!("{} export is empty", cfg.country),
    };
    let idx = ColumnIndex::resolve(&headers, cfg)?;

    let mut rows = Vec::new();
    for (n, result) in records.enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", n + 1))?;
        if n < PREAMBLE_ROWS {
            continue;
        }
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cell = |i: usize| record.get(i).unwrap_or("");

        let finished = parse_finished(cell(idx.finished)).ok_or_else(|| {
            anyhow!(
                "line {}: unrecognised {} value `{}`",
                line,
                COL_FINISHED,
                cell(idx.finished)
            )
        })?;

        let mut demographics = Demographics::default();
        for (var, i) in &idx.demographics {
            demographics.set(*var, non_empty(cell(*i)));
        }

        let mut cells: Vec<String> = record.iter().map(clean_str).collect();
        cells.resize(headers.len(), String::new());

        rows.push(RawResponse {
            distribution_channel: clean_str(cell(idx.channel)),
            finished,
            screened_out: non_empty(cell(idx.screened_out)),
            quota_terminate_flag: non_empty(cell(idx.terminate_flag)),
            demographics,
            cells,
        });
    }
    debug!(country = %cfg.country, rows = rows.len(), "parsed responses");

    Ok(SurveyExport {
        country: cfg.country,
        headers,
        rows,
    })
}
