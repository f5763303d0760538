// src/survey/record.rs

use crate::config::{Country, DemographicVariable};

/// Demographic answers of one response. `None` for empty cells and for
/// variables the country's instrument does not carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demographics {
    pub gender: Option<String>,
    pub age: Option<String>,
    pub flying_plan: Option<String>,
    pub ch_region: Option<String>,
}

impl Demographics {
    pub fn get(&self, var: DemographicVariable) -> Option<&str> {
        match var {
            DemographicVariable::Gender => self.gender.as_deref(),
            DemographicVariable::Age => self.age.as_deref(),
            DemographicVariable::FlyingPlan => self.flying_plan.as_deref(),
            DemographicVariable::ChRegion => self.ch_region.as_deref(),
        }
    }

    pub fn set(&mut self, var: DemographicVariable, value: Option<String>) {
        let slot = match var {
            DemographicVariable::Gender => &mut self.gender,
            DemographicVariable::Age => &mut self.age,
            DemographicVariable::FlyingPlan => &mut self.flying_plan,
            DemographicVariable::ChRegion => &mut self.ch_region,
        };
        *slot = value;
    }
}

/// One survey submission, typed at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub distribution_channel: String,
    pub finished: bool,
    pub screened_out: Option<String>,
    pub quota_terminate_flag: Option<String>,
    pub demographics: Demographics,
    /// Every cell of the source row, aligned with `SurveyExport::headers`.
    pub cells: Vec<String>,
}

/// All responses of one country's export, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyExport {
    pub country: Country,
    /// Column names from the header row.
    pub headers: Vec<String>,
    pub rows: Vec<RawResponse>,
}

impl SurveyExport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of `var` across all rows, nulls included.
    pub fn values(&self, var: DemographicVariable) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(move |r| r.demographics.get(var))
    }
}
