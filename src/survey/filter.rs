// src/survey/filter.rs

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::config::CountryConfig;
use crate::survey::{RawResponse, SurveyExport};

/// `screened_out` values set by attention checks and general screening.
pub const SCREENED_OUT_VALUES: [&str; 4] = ["true", "true_trap1", "true_trap2", "true_trap3"];

/// `Q_TerminateFlag` values set when the panel closed the response.
pub const TERMINATE_FLAG_VALUES: [&str; 2] = ["QuotaMet", "Screened"];

/// `screened_out` value for region-ineligible respondents.
pub const REGION_SCREENED_OUT: &str = "true_region";

/// Why a response is excluded from the valid sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExclusionReason {
    Preview,
    Unfinished,
    ScreenedOut,
    QuotaTerminated,
    OutOfRegion,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExclusionReason::Preview => "preview",
            ExclusionReason::Unfinished => "unfinished",
            ExclusionReason::ScreenedOut => "screened_out",
            ExclusionReason::QuotaTerminated => "quota_terminated",
            ExclusionReason::OutOfRegion => "out_of_region",
        })
    }
}

/// Every exclusion rule `row` matches. Rules are independent; null flags match none.
pub fn exclusion_reasons(row: &RawResponse, cfg: &CountryConfig) -> Vec<ExclusionReason> {
    let screened = row.screened_out.as_deref();
    let mut reasons = Vec::new();

    if row.distribution_channel == "preview" {
        reasons.push(ExclusionReason::Preview);
    }
    if !row.finished {
        reasons.push(ExclusionReason::Unfinished);
    }
    if screened.is_some_and(|s| SCREENED_OUT_VALUES.contains(&s)) {
        reasons.push(ExclusionReason::ScreenedOut);
    }
    if row
        .quota_terminate_flag
        .as_deref()
        .is_some_and(|f| TERMINATE_FLAG_VALUES.contains(&f))
    {
        reasons.push(ExclusionReason::QuotaTerminated);
    }
    if cfg.region_quota && screened == Some(REGION_SCREENED_OUT) {
        reasons.push(ExclusionReason::OutOfRegion);
    }
    reasons
}

pub fn is_valid(row: &RawResponse, cfg: &CountryConfig) -> bool {
    exclusion_reasons(row, cfg).is_empty()
}

/// Per-run filter counts. A row matching several rules counts under each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub kept: usize,
    pub by_reason: BTreeMap<ExclusionReason, usize>,
}

impl FilterStats {
    pub fn dropped(&self) -> usize {
        self.total - self.kept
    }
}

/// Keep only completed, non-preview, non-screened, non-capped responses.
pub fn filter(raw: &SurveyExport, cfg: &CountryConfig) -> SurveyExport {
    filter_with_stats(raw, cfg).0
}

#[tracing::instrument(level = "info", skip_all, fields(country = %cfg.country))]
pub fn filter_with_stats(raw: &SurveyExport, cfg: &CountryConfig) -> (SurveyExport, FilterStats) {
    let mut stats = FilterStats {
        total: raw.len(),
        ..Default::default()
    };

    let rows: Vec<RawResponse> = raw
        .rows
        .iter()
        .filter(|row| {
            let reasons = exclusion_reasons(row, cfg);
            for r in &reasons {
                *stats.by_reason.entry(*r).or_default() += 1;
            }
            reasons.is_empty()
        })
        .cloned()
        .collect();
    stats.kept = rows.len();

    for (reason, n) in &stats.by_reason {
        debug!(%reason, rows = n, "exclusion rule matched");
    }
    info!(
        total = stats.total,
        kept = stats.kept,
        dropped = stats.dropped(),
        "filtered responses"
    );

    (
        SurveyExport {
            country: raw.country,
            headers: raw.headers.clone(),
            rows,
        },
        stats,
    )
}
