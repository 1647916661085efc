use thiserror::Error;

use crate::parameters::LoggerOpts;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("installing log subscriber: `{0}`")]
    Init(String),
}

/// Installs the global subscriber.
///
/// Text lines by default, JSON lines without timestamps with `log_json`. Source file and line
/// are added in debug and JSON mode.
pub fn init(opts: &LoggerOpts) -> Result<(), LoggingError> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(opts.max_level())
        .with_writer(std::io::stderr)
        .with_file(opts.report_caller())
        .with_line_number(opts.report_caller());

    let result = if opts.log_json {
        builder.json().without_time().try_init()
    } else {
        builder.with_target(opts.debug).try_init()
    };

    result.map_err(|err| LoggingError::Init(err.to_string()))
}
