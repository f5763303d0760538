// Shared builders for unit tests.

use crate::config::{Country, DemographicVariable};
use crate::survey::{Demographics, RawResponse, SurveyExport};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const EXPORT_HEADER: &str =
    "DistributionChannel,Finished,screened_out,Q_TerminateFlag,gender,age,plan,ch_region";

pub const PREAMBLE: &str = "\"Distribution Channel\",Finished,screened_out,Q_TerminateFlag,\"What is your gender?\",\"How old are you?\",\"Do you plan to fly, this year?\",Region\n\
{\"ImportId\":\"distributionChannel\"},{\"ImportId\":\"finished\"},{\"ImportId\":\"screened_out\"},{\"ImportId\":\"Q_TerminateFlag\"},{\"ImportId\":\"QID1\"},{\"ImportId\":\"QID2\"},{\"ImportId\":\"QID3\"},{\"ImportId\":\"QID4\"}\n";

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,quotacheck=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A finished, unscreened response with the given demographics.
pub fn valid_response(demographics: Demographics) -> RawResponse {
    RawResponse {
        distribution_channel: "anonymous".into(),
        finished: true,
        screened_out: None,
        quota_terminate_flag: None,
        demographics,
        cells: Vec::new(),
    }
}

/// Response carrying a single demographic answer.
pub fn answering(var: DemographicVariable, value: Option<&str>) -> RawResponse {
    let mut d = Demographics::default();
    d.set(var, value.map(str::to_string));
    valid_response(d)
}

/// Export of `n` copies of each `(value, n)` pair for one variable.
pub fn export_with(
    country: Country,
    var: DemographicVariable,
    counts: &[(Option<&str>, usize)],
) -> SurveyExport {
    let rows = counts
        .iter()
        .flat_map(|(value, n)| std::iter::repeat_with(move || answering(var, *value)).take(*n))
        .collect();
    SurveyExport {
        country,
        headers: Vec::new(),
        rows,
    }
}
