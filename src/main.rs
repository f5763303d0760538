use anyhow::Result;
use chrono::Local;
use quotacheck::{
    config::{locate_or_seed, Config, CONFIG_ENV, DEFAULT_CONFIG},
    pipeline,
};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) locate config ────────────────────────────────────────────
    let explicit = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);
    let Some(config_path) = locate_or_seed(explicit, Path::new(DEFAULT_CONFIG))? else {
        info!(
            path = DEFAULT_CONFIG,
            "no config found; wrote the study defaults, set the export paths and rerun"
        );
        return Ok(());
    };
    let config = Config::load(&config_path)?;
    info!(
        path = %config_path.display(),
        countries = config.countries.len(),
        quota_rows = config.quotas.len(),
        "loaded config"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let run_date = Local::now().date_naive();
    let summary = pipeline::run(&config, run_date)?;

    for (country, n) in &summary.valid_counts {
        info!(%country, valid = n, "sample size");
    }
    for p in &summary.clean_paths {
        info!(path = %p.display(), "clean export");
    }
    println!("{}", summary.report_path.display());

    info!("all done");
    Ok(())
}
