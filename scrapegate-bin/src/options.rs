use std::path::{Path, PathBuf};
use std::{fs, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use const_format::{concatcp, formatcp};
use scrapegate_lib::{ScraperConfig, server};
use serde::Deserialize;

use crate::verbosity::Verbosity;

pub(crate) const SCRAPEGATE_CONFIG_FILE: &str = "scrapegate.toml";

const DEFAULT_PATH: &str = "/";
const DEFAULT_WORKERS: u8 = 2;
const DEFAULT_TIMEOUT_MILLIS: u64 = 1000;

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const WORKERS_STR: &str = concatcp!(DEFAULT_WORKERS);
const TIMEOUT_STR: &str = concatcp!(DEFAULT_TIMEOUT_MILLIS);
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    SCRAPEGATE_CONFIG_FILE,
);

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    listen: String = server::DEFAULT_LISTEN.to_string();
    path: String = DEFAULT_PATH.to_string();
    workers: u8 = DEFAULT_WORKERS;
    timeout: u64 = DEFAULT_TIMEOUT_MILLIS;
    metrics: String = server::DEFAULT_METRICS_LISTEN.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// scrapegate fetches URLs on behalf of its callers.
///
/// POST `{"url": "<target>"}` to the scrape endpoint and scrapegate performs a
/// single GET against the target, answering `200` if a response came back
/// (whatever its status), `400` if not, and `408` if all workers stayed busy
/// for longer than the timeout. Outcomes are exported as prometheus metrics.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct ScrapegateOptions {
    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

/// The main configuration for scrapegate
#[derive(Parser, Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Service listen address
    #[arg(short, long, env = "SCRAPEGATE_LISTEN", default_value = server::DEFAULT_LISTEN)]
    #[serde(default = "listen")]
    pub(crate) listen: String,

    /// Path of the scrape endpoint
    #[arg(long, env = "SCRAPEGATE_PATH", default_value = DEFAULT_PATH)]
    #[serde(default = "path")]
    pub(crate) path: String,

    /// Number of scrape requests served at the same time
    #[arg(short, long, env = "SCRAPEGATE_WORKERS", default_value = WORKERS_STR)]
    #[serde(default = "workers")]
    pub(crate) workers: u8,

    /// Maximum time (in milliseconds) a request waits for a worker
    #[arg(
        short,
        long,
        env = "SCRAPEGATE_TIMEOUT",
        value_name = "MILLIS",
        default_value = TIMEOUT_STR
    )]
    #[serde(default = "timeout")]
    pub(crate) timeout: u64,

    /// Metrics listen address
    #[arg(short, long, env = "SCRAPEGATE_METRICS", default_value = server::DEFAULT_METRICS_LISTEN)]
    #[serde(default = "metrics")]
    pub(crate) metrics: String,
}

impl Config {
    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys with defaults to assign
                verbose: Verbosity::default(),
                listen: server::DEFAULT_LISTEN,
                path: DEFAULT_PATH,
                workers: DEFAULT_WORKERS,
                timeout: DEFAULT_TIMEOUT_MILLIS,
                metrics: server::DEFAULT_METRICS_LISTEN,
            }
        }
    }

    /// Settings of the scrape endpoint
    pub(crate) fn scraper(&self) -> ScraperConfig {
        ScraperConfig {
            listen: self.listen.clone(),
            path: self.path.clone(),
            capacity: usize::from(self.workers),
            admission_timeout: Duration::from_millis(self.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        ScrapegateOptions::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let opts = ScrapegateOptions::parse_from(["scrapegate"]);
        let config = opts.config;

        assert_eq!(opts.config_file, None);
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.path, "/");
        assert_eq!(config.workers, 2);
        assert_eq!(config.timeout, 1000);
        assert_eq!(config.metrics, "0.0.0.0:9095");
    }

    #[test]
    fn test_scraper_config() {
        let opts = ScrapegateOptions::parse_from([
            "scrapegate",
            "--listen",
            "127.0.0.1:0",
            "--workers",
            "8",
            "--timeout",
            "250",
        ]);
        assert_eq!(
            opts.config.scraper(),
            ScraperConfig {
                listen: "127.0.0.1:0".to_string(),
                path: "/".to_string(),
                capacity: 8,
                admission_timeout: Duration::from_millis(250),
            }
        );
    }

    #[test]
    fn test_workers_out_of_range() {
        assert!(ScrapegateOptions::try_parse_from(["scrapegate", "--workers", "256"]).is_err());
        assert!(ScrapegateOptions::try_parse_from(["scrapegate", "--workers", "-1"]).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
verbose = "debug"
listen = "127.0.0.1:8081"
workers = 4
timeout = 2000
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.verbose.log_level(), log::Level::Debug);
        assert_eq!(config.listen, "127.0.0.1:8081");
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeout, 2000);
        // missing keys take the defaults
        assert_eq!(config.metrics, "0.0.0.0:9095");
        assert_eq!(config.path, "/");
    }

    #[test]
    fn test_load_from_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads = 4").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_cli_wins_over_file() {
        let toml: Config = toml::from_str(
            r#"
listen = "127.0.0.1:8081"
workers = 4
timeout = 2000
"#,
        )
        .unwrap();

        let mut cli = ScrapegateOptions::parse_from(["scrapegate", "--workers", "8"]).config;
        cli.merge(toml);

        // explicitly given on the command line
        assert_eq!(cli.workers, 8);
        // only given in the file
        assert_eq!(cli.listen, "127.0.0.1:8081");
        assert_eq!(cli.timeout, 2000);
        // given nowhere
        assert_eq!(cli.metrics, "0.0.0.0:9095");
    }

    #[test]
    fn test_cli_wins_over_file_for_every_key() {
        let toml: Config = toml::from_str(
            r#"
verbose = "debug"
listen = "127.0.0.1:8081"
path = "/from-file"
workers = 4
timeout = 2000
metrics = "127.0.0.1:9096"
"#,
        )
        .unwrap();

        let mut cli = ScrapegateOptions::parse_from([
            "scrapegate",
            "-q",
            "--listen",
            "127.0.0.1:8082",
            "--path",
            "/from-cli",
            "--workers",
            "8",
            "--timeout",
            "3000",
            "--metrics",
            "127.0.0.1:9097",
        ])
        .config;
        let expected = cli.clone();
        cli.merge(toml);

        assert_eq!(cli, expected);
    }
}
