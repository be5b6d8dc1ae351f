//! Logger setup for the command line.

use std::io::{self, Write};

use anyhow::Result;
use env_logger::Builder;
use env_logger::fmt::Formatter;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::Record;

use super::command::{Cli, LogFormat};

/// Installs the global logger.
///
/// With `--progress`, records are routed through `multi` so log lines are
/// printed above the bars instead of through them.
pub fn init(cli: &Cli, multi: &MultiProgress) -> Result<()> {
    let mut builder = Builder::from_default_env();
    builder.filter_level(cli.loglevel.to_level_filter());

    match cli.log_format {
        LogFormat::Plain => {
            builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            builder.format(write_json);
        }
    }

    if !cli.progress {
        builder.try_init()?;
        return Ok(());
    }

    let logger = builder.build();
    let max_level = logger.filter();
    LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(max_level);

    Ok(())
}

fn write_json(buf: &mut Formatter, record: &Record<'_>) -> io::Result<()> {
    let line = json_record(&buf.timestamp().to_string(), record);
    writeln!(buf, "{line}")
}

/// One log record as a single-line JSON object.
fn json_record(timestamp: &str, record: &Record<'_>) -> serde_json::Value {
    serde_json::json!({
        "ts": timestamp,
        "lvl": record.level().as_str(),
        "target": record.target(),
        "msg": record.args().to_string(),
    })
}
