use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::verbosity::Verbosity;

/// Initialize the logging system with the given verbosity level.
pub(crate) fn init_logging(verbose: &Verbosity) {
    // Other crates (hyper, reqwest, ...) only log warnings by default.
    // It will be overridden by RUST_LOG if it's set.
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);
    builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);

    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Warn);

        // Our own crates follow `-v`/`-q`
        let level_filter = verbose.log_level_filter();
        builder
            .filter_module("scrapegate", level_filter)
            .filter_module("scrapegate_lib", level_filter);
    }

    builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));

    builder.init();
}
