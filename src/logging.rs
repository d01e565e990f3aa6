
//! Run logging for `sketch` and `compare`.
//!
//! Both subcommands log to stderr and append to `kpresence.log` in their output
//! directory, so a directory of sketch files or a presence table keeps the record of
//! the runs (arguments, parameters, per-file read counts) that produced it.

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;
use log4rs::{
    append::{console::{ConsoleAppender, Target}, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

pub const LOG_FILE: &str = "kpresence.log";

const LOG_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {h({l})}: {m}{n}";

/// Build a configuration logging records at `level` and above to stderr and `log_file`.
pub fn logger_config(log_file: &Path, level: LevelFilter) -> Result<Config> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .target(Target::Stderr)
        .build();

    // appends, so repeated runs in one output directory share a log
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(true)
        .build(log_file)?;

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("stderr", Box::new(stderr)),
        ).appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("logfile", Box::new(logfile)),
        )
        .build(Root::builder().appender("stderr").appender("logfile").build(LevelFilter::Trace))?;

    Ok(config)
}

/// Install the global logger, writing info and above to stderr and `<out_dir>/kpresence.log`.
pub fn setup_logger(out_dir: &Path) -> Result<()> {
    let config = logger_config(&out_dir.join(LOG_FILE), LevelFilter::Info)?;
    log4rs::init_config(config)?;
    Ok(())
}
