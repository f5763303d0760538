// src/quota/aggregate.rs

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::config::{
    categories_of, variables_of, Country, CountryConfig, DemographicVariable, QuotaTarget,
};
use crate::quota::recode::merge_buckets;
use crate::survey::SurveyExport;

/// Round half away from zero to two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Ordered `category -> proportion` mapping for one variable.
///
/// `Some(0.0)` is "applicable, nobody observed"; `None` is "not applicable".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proportions {
    entries: Vec<(String, Option<f64>)>,
}

impl Proportions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if the category is absent, `Some(None)` if it is present but null.
    pub fn get(&self, category: &str) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, v)| *v)
    }

    /// Update an existing category in place, or append it.
    pub fn set(&mut self, category: &str, value: Option<f64>) {
        match self.entries.iter_mut().find(|(c, _)| c == category) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((category.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), *v))
    }

    /// Sum of the non-null proportions.
    pub fn total(&self) -> f64 {
        self.entries.iter().filter_map(|(_, v)| *v).sum()
    }
}

/// Relative frequency of each category among rows where `var` is non-null.
///
/// Every requested category gets a value; with no non-null rows all are `0.0`.
pub fn aggregate(valid: &SurveyExport, var: DemographicVariable, categories: &[String]) -> Proportions {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut non_null = 0usize;
    for value in valid.values(var).flatten() {
        *counts.entry(value).or_default() += 1;
        non_null += 1;
    }

    let mut out = Proportions::new();
    for category in categories {
        let share = if non_null == 0 {
            0.0
        } else {
            let n = counts.get(category.as_str()).copied().unwrap_or(0);
            round2(n as f64 / non_null as f64)
        };
        out.set(category, Some(share));
    }
    out
}

/// Observed proportions and sample size of one country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryAggregate {
    pub country: Country,
    pub sample_size: usize,
    /// Variables the country does not use are absent, not empty.
    pub proportions: BTreeMap<DemographicVariable, Proportions>,
}

impl CountryAggregate {
    /// Observed cell for one quota row; `None` when inapplicable to this country.
    pub fn observed(&self, var: DemographicVariable, category: &str) -> Option<f64> {
        self.proportions.get(&var)?.get(category).flatten()
    }
}

/// Aggregate every quota variable for one country, then apply its age recode.
#[instrument(level = "info", skip_all, fields(country = %cfg.country))]
pub fn country_proportions(
    valid: &SurveyExport,
    cfg: &CountryConfig,
    quotas: &[QuotaTarget],
) -> CountryAggregate {
    let mut proportions = BTreeMap::new();
    for var in variables_of(quotas) {
        if !cfg.uses(var) {
            debug!(variable = %var, "variable not collected for country, omitted");
            continue;
        }
        let categories = categories_of(quotas, var);
        let mut props = aggregate(valid, var, &categories);
        if var == DemographicVariable::Age {
            if let Some(merge) = &cfg.age_recode {
                props = merge_buckets(&props, merge);
            }
        }
        debug!(variable = %var, categories = props.len(), total = props.total(), "aggregated");
        proportions.insert(var, props);
    }

    CountryAggregate {
        country: cfg.country,
        sample_size: valid.len(),
        proportions,
    }
}
