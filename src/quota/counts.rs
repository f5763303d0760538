// src/quota/counts.rs

use std::collections::{BTreeMap, HashMap};

use crate::config::DemographicVariable;
use crate::survey::SurveyExport;

/// Non-null category counts of `var`, most frequent first, ties by category name.
pub fn value_counts(valid: &SurveyExport, var: DemographicVariable) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in valid.values(var).flatten() {
        *counts.entry(v).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, n)| (k.to_string(), n))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Count each combination of values across `vars`; rows with any null are skipped.
pub fn cross_counts(
    valid: &SurveyExport,
    vars: &[DemographicVariable],
) -> BTreeMap<Vec<String>, usize> {
    let mut out = BTreeMap::new();
    for row in &valid.rows {
        let key: Option<Vec<String>> = vars
            .iter()
            .map(|v| row.demographics.get(*v).map(str::to_string))
            .collect();
        if let Some(key) = key {
            *out.entry(key).or_default() += 1;
        }
    }
    out
}
