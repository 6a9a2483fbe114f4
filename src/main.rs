use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use opendir_m3u::{Config, PlaylistGenerator, ScraperError};

#[tokio::main]
async fn main() -> ExitCode {
    let matches = Command::new("opendir-m3u")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Build a TMDB-enriched M3U playlist from an HTTP open directory")
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .help("Root of the open directory (overrides FTP_PUBLIC_URL)")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Playlist destination")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML config file")
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .value_parser(clap::value_parser!(usize))
                .help("Number of listing pages fetched in parallel")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let log_handle = init_logging(verbose);

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    apply_log_level(&log_handle, &config.output.log_level, verbose);

    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.crawler.base_url = opendir_m3u::config::normalize_base_url(base_url);
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output.playlist_path = PathBuf::from(output);
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.crawler.max_concurrent_requests = *workers;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<ScraperError>()
                .map(ScraperError::exit_code)
                .unwrap_or(1);
            error!("{:#}", e);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(config: Config) -> Result<()> {
    info!("🚀 opendir-m3u starting...");
    tracing::debug!("{}", config.summary());

    let generator = PlaylistGenerator::new(&config)?;
    let report = generator.run().await?;

    info!("🎉 Finished in {:.2}s", report.elapsed.as_secs_f64());
    info!(
        "✅ Matched: {} | ⚠️ Unmatched: {} | Total: {}",
        report.matched, report.unmatched, report.total
    );
    info!("📡 TMDB requests: {}", report.metadata_requests);

    Ok(())
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

/// Install the global subscriber before anything else can log
fn init_logging(verbose: bool) -> LogHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter("info", verbose)));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    handle
}

/// Switch to the configured level; RUST_LOG and -v take precedence
fn apply_log_level(handle: &LogHandle, level: &str, verbose: bool) {
    if verbose || std::env::var_os("RUST_LOG").is_some() {
        return;
    }

    if let Err(e) = handle.reload(EnvFilter::new(default_filter(level, false))) {
        warn!("Could not apply log level {}: {}", level, e);
    }
}

fn default_filter(level: &str, verbose: bool) -> String {
    if verbose {
        "opendir_m3u=debug,warn".to_string()
    } else {
        format!("opendir_m3u={},warn", level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("info", false), "opendir_m3u=info,warn");
        assert_eq!(default_filter("trace", false), "opendir_m3u=trace,warn");
        assert_eq!(default_filter("error", true), "opendir_m3u=debug,warn");
    }

    #[test]
    fn test_reload_switches_level() {
        let (filter, handle): (_, LogHandle) =
            reload::Layer::new(EnvFilter::new(default_filter("info", false)));
        let subscriber = tracing_subscriber::registry().with(filter);

        tracing::subscriber::with_default(subscriber, || {
            assert!(!tracing::enabled!(target: "opendir_m3u", tracing::Level::DEBUG));
            apply_log_level(&handle, "debug", false);
            if std::env::var_os("RUST_LOG").is_none() {
                assert!(tracing::enabled!(target: "opendir_m3u", tracing::Level::DEBUG));
            }
        });
    }
}
