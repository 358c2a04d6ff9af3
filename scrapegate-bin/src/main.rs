//! `scrapegate` is an HTTP service which fetches URLs on behalf of its callers
//! while bounding how many fetches run at the same time.
//!
//! The scrapegate binary is a wrapper around scrapegate-lib, which provides
//! the admission gate, the fetch operation and the HTTP listeners.
//!
//! Run it with the defaults (scrape endpoint on port 8080, two workers,
//! metrics on port 9095):
//! ```sh
//! scrapegate
//! ```
//!
//! Allow more concurrent fetches, and let callers wait longer for a worker:
//! ```sh
//! scrapegate --workers 16 --timeout 5000
//! ```
//!
//! Ask it to fetch a URL:
//! ```sh
//! curl -X POST -d '{"url": "https://example.com"}' http://localhost:8080/
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, crate_version};
use log::{error, info, warn};
#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature
use scrapegate_lib::{Metrics, MetricsService, ReqwestFetcher, ScrapeService, TelemetrySink};

mod logger;
mod options;
mod verbosity;

use crate::logger::init_logging;
use crate::options::{Config, SCRAPEGATE_CONFIG_FILE, ScrapegateOptions};

/// A C-like enum that can be cast to `i32` and used as process exit code.
///
/// Exit code 1 is left to any `Result::Err` bubbled up to `main()`, e.g. when
/// a listen address cannot be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<ScrapegateOptions> {
    let mut opts = ScrapegateOptions::parse();

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // If no config file was explicitly provided, we try to load the default
        // config file from the current directory if the file exits. This will
        // raise an error if the file is invalid, just like the explicit provided
        // config file.
        let default_config = PathBuf::from(SCRAPEGATE_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    // The config file may change the verbosity, so logging starts afterwards
    init_logging(&opts.config.verbose);

    Ok(opts)
}

/// Set up runtime and call scrapegate entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            // Logging is not initialized before the config is loaded
            eprintln!("[ERROR] Error while loading config: {e}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&opts.config))
}

/// Serve scrape requests until the scrape listener stops or the process is
/// interrupted
async fn run(cfg: &Config) -> Result<i32> {
    let metrics = Metrics::new().context("Cannot register metrics")?;
    let fetcher = Arc::new(ReqwestFetcher::new().context("Failed to create request client")?);

    let exporter = MetricsService::start(&cfg.metrics, metrics.registry().clone())
        .await
        .context("Cannot start metrics service")?;
    let sink: Arc<dyn TelemetrySink> = Arc::new(metrics.clone());
    let scraper = ScrapeService::start(cfg.scraper(), sink, fetcher)
        .await
        .context("Cannot start scrape service")?;

    info!(
        "scrapegate {} serving {} with {} workers (timeout {}ms), metrics on http://{}/metrics",
        crate_version!(),
        scraper.url(),
        cfg.workers,
        cfg.timeout,
        exporter.local_addr()
    );

    let shutdown = scraper.cancellation_token();
    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!("Cannot listen for the interrupt signal: {e}"),
        }
    });

    let served = scraper.wait().await;
    interrupt.abort();
    exporter.shutdown();
    if let Err(e) = exporter.wait().await {
        error!("Metrics service failed: {e}");
    }
    metrics.shutdown();

    served.context("Scrape service failed")?;
    Ok(ExitCode::Success as i32)
}
