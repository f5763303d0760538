use anyhow::{anyhow, Context, Result};
use prettytable::{format, Cell, Row, Table};
use std::env;
use tracing_subscriber::{fmt, EnvFilter};

use quotacheck::{
    config::{Config, Country, DemographicVariable, CONFIG_ENV, DEFAULT_CONFIG},
    quota::{cross_counts, value_counts},
    survey::{filter_with_stats, load_export},
};

/// Print category counts of one country's valid responses.
///
/// Usage: category_counts <COUNTRY> [CONFIG]
fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let code = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("Usage: category_counts <COUNTRY> [CONFIG]"))?;
    let country = Country::from_code(&code).ok_or_else(|| anyhow!("unknown country `{}`", code))?;
    let config_path = env::args()
        .nth(2)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let config = Config::load(&config_path)?;
    let cfg = config
        .country(country)
        .with_context(|| format!("{} is not configured in {}", country, config_path))?;

    let raw = load_export(cfg)?;
    let (valid, stats) = filter_with_stats(&raw, cfg);
    println!(
        "{}: {} responses, {} valid, {} excluded",
        country,
        stats.total,
        stats.kept,
        stats.dropped()
    );
    for (reason, n) in &stats.by_reason {
        println!("  {:<18} {:>6}", reason.to_string(), n);
    }

    let variables: Vec<DemographicVariable> = DemographicVariable::ALL
        .into_iter()
        .filter(|v| cfg.uses(*v))
        .collect();

    for var in &variables {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.add_row(Row::new(vec![
            Cell::new(var.as_str()).style_spec("bFg"),
            Cell::new("Count").style_spec("bFg"),
        ]));
        for (category, n) in value_counts(&valid, *var) {
            table.add_row(Row::new(vec![
                Cell::new(&category),
                Cell::new(&n.to_string()).style_spec("r"),
            ]));
        }
        println!();
        table.printstd();
    }

    let crossed = cross_counts(&valid, &variables);
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    let mut header: Vec<Cell> = variables
        .iter()
        .map(|v| Cell::new(v.as_str()).style_spec("bFg"))
        .collect();
    header.push(Cell::new("Count").style_spec("bFg"));
    table.add_row(Row::new(header));
    for (combo, n) in crossed {
        let mut cells: Vec<Cell> = combo.iter().map(|c| Cell::new(c)).collect();
        cells.push(Cell::new(&n.to_string()).style_spec("r"));
        table.add_row(Row::new(cells));
    }
    println!("\n--- Cross-category counts ---");
    table.printstd();

    Ok(())
}
