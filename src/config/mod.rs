// src/config/mod.rs

pub mod types;

pub use types::{
    BucketMerge, CleanConfig, CleanFormat, Country, CountryConfig, DemographicVariable,
    QuotaTarget,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Environment variable naming the config file when no argument is given.
pub const CONFIG_ENV: &str = "QUOTACHECK_CONFIG";
/// Config file used when no path is given; seeded with the study defaults if missing.
pub const DEFAULT_CONFIG: &str = "quotacheck.yaml";

/// Allowed gap between 1.0 and the summed targets of one variable.
const TARGET_SUM_SLACK: f64 = 0.01;

fn default_tolerance() -> f64 {
    0.05
}

/// Run configuration: where the exports live and what the quotas are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory that receives `quotacheck_<DDMMYY>.csv`.
    pub output_dir: PathBuf,
    /// Observed-vs-target gap above which a category is logged as off quota.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<CleanConfig>,
    /// Countries in report column order.
    pub countries: Vec<CountryConfig>,
    /// Quota rows in report row order.
    pub quotas: Vec<QuotaTarget>,
}

impl Config {
    /// Read and validate a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config as YAML, e.g. to seed a first run.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).with_context(|| format!("writing config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.countries.is_empty() {
            bail!("config lists no countries");
        }

        let mut seen = HashSet::new();
        for c in &self.countries {
            if !seen.insert(c.country) {
                bail!("country {} is configured twice", c.country);
            }
        }

        if self.quotas.is_empty() {
            bail!("config has an empty quota table");
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            bail!("tolerance {} is outside [0, 1]", self.tolerance);
        }

        let mut rows = HashSet::new();
        for q in &self.quotas {
            if q.category.trim().is_empty() {
                bail!("quota row for `{}` has an empty category", q.variable);
            }
            if !rows.insert((q.variable, q.category.as_str())) {
                bail!("quota row {}/{} appears twice", q.variable, q.category);
            }
            for (country, target) in &q.targets {
                if let Some(t) = target {
                    if !(0.0..=1.0).contains(t) {
                        bail!(
                            "target {} for {}/{} in {} is outside [0, 1]",
                            t,
                            q.variable,
                            q.category,
                            country
                        );
                    }
                }
            }
        }

        let age_categories = self.categories(DemographicVariable::Age);
        for c in &self.countries {
            if let Some(merge) = &c.age_recode {
                if merge.keep == merge.fold {
                    bail!("age recode for {} folds `{}` into itself", c.country, merge.keep);
                }
                for cat in [&merge.keep, &merge.fold] {
                    if !age_categories.contains(cat) {
                        bail!(
                            "age recode for {} names `{}`, which is not an age category",
                            c.country,
                            cat
                        );
                    }
                }
            }
        }

        self.check_target_sums();
        Ok(())
    }

    /// Warn on variables whose non-null targets do not add up to 1.
    fn check_target_sums(&self) {
        let mut sums: BTreeMap<(DemographicVariable, Country), f64> = BTreeMap::new();
        for q in &self.quotas {
            for (country, target) in &q.targets {
                if let Some(t) = target {
                    *sums.entry((q.variable, *country)).or_default() += t;
                }
            }
        }
        for ((variable, country), sum) in sums {
            if (sum - 1.0).abs() > TARGET_SUM_SLACK {
                warn!(%variable, %country, sum, "quota targets do not sum to 1");
            } else {
                debug!(%variable, %country, sum, "quota targets ok");
            }
        }
    }

    /// Categories of `var`, in quota table order.
    pub fn categories(&self, var: DemographicVariable) -> Vec<String> {
        categories_of(&self.quotas, var)
    }

    /// Variables present in the quota table, in first-seen order.
    pub fn variables(&self) -> Vec<DemographicVariable> {
        variables_of(&self.quotas)
    }

    pub fn country(&self, country: Country) -> Option<&CountryConfig> {
        self.countries.iter().find(|c| c.country == country)
    }

    /// The quota table and instrument mapping of the three-country study.
    pub fn study_default() -> Self {
        use Country::*;
        use DemographicVariable::*;

        let quotas = vec![
            QuotaTarget::new(Gender, "male", &[(US, 0.49), (CH, 0.5), (CN, 0.51)]),
            QuotaTarget::new(Gender, "female", &[(US, 0.51), (CH, 0.5), (CN, 0.49)]),
            QuotaTarget::new(Age, "18y_24y", &[(US, 0.12), (CH, 0.09), (CN, 0.12)]),
            QuotaTarget::new(Age, "25y_34y", &[(US, 0.18), (CH, 0.18), (CN, 0.2)]),
            QuotaTarget::new(Age, "35y_44y", &[(US, 0.18), (CH, 0.19), (CN, 0.18)]),
            QuotaTarget::new(Age, "45y_54y", &[(US, 0.16), (CH, 0.18), (CN, 0.16)]),
            QuotaTarget::new(Age, "55y_64y", &[(US, 0.17), (CH, 0.18), (CN, 0.34)]),
            QuotaTarget::new(Age, "65y_above", &[(US, 0.19), (CH, 0.18)]),
            QuotaTarget::new(FlyingPlan, "no", &[(US, 0.2), (CH, 0.2), (CN, 0.3)]),
            QuotaTarget::new(ChRegion, "german", &[(CH, 0.73)]),
            QuotaTarget::new(ChRegion, "french", &[(CH, 0.27)]),
            QuotaTarget::new(ChRegion, "italian", &[]),
            QuotaTarget::new(ChRegion, "romansch", &[]),
        ];

        let us = CountryConfig::new(US, "data/Aviation_Justice_US.csv");
        let mut ch = CountryConfig::new(CH, "data/Aviation_Justice_CH.csv");
        ch.region_quota = true;
        let mut cn = CountryConfig::new(CN, "data/Aviation_Justice_CN.csv");
        cn.age_recode = Some(BucketMerge {
            keep: "55y_64y".into(),
            fold: "65y_above".into(),
        });

        Config {
            output_dir: PathBuf::from("reports"),
            tolerance: default_tolerance(),
            clean: Some(CleanConfig {
                dir: PathBuf::from("clean"),
                format: CleanFormat::Csv,
            }),
            countries: vec![us, ch, cn],
            quotas,
        }
    }
}

/// Resolve the config file to load.
///
/// An explicit path must exist. A missing `fallback` is seeded with
/// `Config::study_default()` and `Ok(None)` is returned.
pub fn locate_or_seed(explicit: Option<PathBuf>, fallback: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config {} does not exist", path.display());
        }
        return Ok(Some(path));
    }
    if fallback.exists() {
        return Ok(Some(fallback.to_path_buf()));
    }
    Config::study_default().save(fallback)?;
    Ok(None)
}

/// Variables present in `quotas`, in first-seen order.
pub fn variables_of(quotas: &[QuotaTarget]) -> Vec<DemographicVariable> {
    let mut out = Vec::new();
    for q in quotas {
        if !out.contains(&q.variable) {
            out.push(q.variable);
        }
    }
    out
}

/// Categories of `var` in `quotas`, in table order.
pub fn categories_of(quotas: &[QuotaTarget], var: DemographicVariable) -> Vec<String> {
    quotas
        .iter()
        .filter(|q| q.variable == var)
        .map(|q| q.category.clone())
        .collect()
}
