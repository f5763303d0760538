// src/config/types.rs

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

/// Countries fielded by the study. Report columns are named after `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Country {
    US,
    CH,
    CN,
}

impl Country {
    pub fn as_str(&self) -> &'static str {
        match self {
            Country::US => "US",
            Country::CH => "CH",
            Country::CN => "CN",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "US" => Some(Country::US),
            "CH" => Some(Country::CH),
            "CN" => Some(Country::CN),
            _ => None,
        }
    }

    /// Lower-case code used in export filenames (`data_clean_us.csv`).
    pub fn file_code(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Demographic variables carried in the quota table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemographicVariable {
    Gender,
    Age,
    FlyingPlan,
    ChRegion,
}

impl DemographicVariable {
    pub const ALL: [DemographicVariable; 4] = [
        DemographicVariable::Gender,
        DemographicVariable::Age,
        DemographicVariable::FlyingPlan,
        DemographicVariable::ChRegion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DemographicVariable::Gender => "gender",
            DemographicVariable::Age => "age",
            DemographicVariable::FlyingPlan => "flying_plan",
            DemographicVariable::ChRegion => "ch_region",
        }
    }
}

impl fmt::Display for DemographicVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge two adjacent buckets of one variable into the lower one after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMerge {
    /// Category that receives the summed proportion.
    pub keep: String,
    /// Category folded into `keep`; reported as null afterwards.
    pub fold: String,
}

/// One country's export and its instrument quirks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryConfig {
    pub country: Country,
    pub source: PathBuf,
    /// Whether the country has regional quotas (and the `true_region` screen-out).
    #[serde(default)]
    pub region_quota: bool,
    /// Source column per demographic variable, where it differs from the variable name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<DemographicVariable, String>,
    /// Age bucket merge for instruments with a coarser top bracket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_recode: Option<BucketMerge>,
}

impl CountryConfig {
    pub fn new(country: Country, source: impl Into<PathBuf>) -> Self {
        Self {
            country,
            source: source.into(),
            region_quota: false,
            columns: BTreeMap::new(),
            age_recode: None,
        }
    }

    /// Column in the export that holds `var` for this country.
    pub fn column(&self, var: DemographicVariable) -> &str {
        self.columns
            .get(&var)
            .map(String::as_str)
            .unwrap_or_else(|| var.as_str())
    }

    /// Regional categories only exist for countries with a regional quota.
    pub fn uses(&self, var: DemographicVariable) -> bool {
        var != DemographicVariable::ChRegion || self.region_quota
    }
}

/// One row of the target quota table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaTarget {
    pub variable: DemographicVariable,
    pub category: String,
    /// Target proportion per country; absent or null means not applicable.
    #[serde(default)]
    pub targets: BTreeMap<Country, Option<f64>>,
}

impl QuotaTarget {
    pub fn new(variable: DemographicVariable, category: &str, targets: &[(Country, f64)]) -> Self {
        Self {
            variable,
            category: category.to_string(),
            targets: targets.iter().map(|(c, v)| (*c, Some(*v))).collect(),
        }
    }

    pub fn target(&self, country: Country) -> Option<f64> {
        self.targets.get(&country).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanFormat {
    #[default]
    Csv,
    Parquet,
}

impl CleanFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CleanFormat::Csv => "csv",
            CleanFormat::Parquet => "parquet",
        }
    }
}

/// Where and how cleaned per-country responses are exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanConfig {
    pub dir: PathBuf,
    #[serde(default)]
    pub format: CleanFormat,
}
