pub mod aggregate;
pub mod counts;
pub mod recode;
pub mod report;

pub use aggregate::{aggregate, country_proportions, round2, CountryAggregate, Proportions};
pub use counts::{cross_counts, value_counts};
pub use recode::merge_buckets;
pub use report::{assemble, report_path, write_report, Deviation, QuotaReport, ReportRow};
