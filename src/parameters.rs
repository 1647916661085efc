use clap::error::ErrorKind;
use clap::{Args, Parser};
use serde::Serialize;
use tracing::Level;

pub const DEFAULT_AZURE_ENVIRONMENT: &str = "AZUREPUBLICCLOUD";

/// Logs which Azure identity, subscriptions and resource groups are visible from here.
#[derive(Parser, Debug, Clone, PartialEq, Serialize)]
#[command(name = "azure-debug-info", version)]
pub struct Opts {
    #[command(flatten)]
    #[serde(rename = "Logger")]
    pub logger: LoggerOpts,

    #[command(flatten)]
    #[serde(rename = "Azure")]
    pub azure: AzureOpts,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoggerOpts {
    /// Debug mode
    #[arg(long, env = "DEBUG")]
    #[serde(rename = "Debug")]
    pub debug: bool,

    /// Verbose mode
    #[arg(short, long, env = "VERBOSE")]
    #[serde(rename = "Verbose")]
    pub verbose: bool,

    /// Switch log output to json format
    #[arg(long = "log.json", env = "LOG_JSON")]
    #[serde(rename = "LogJson")]
    pub log_json: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Serialize)]
pub struct AzureOpts {
    /// Azure environment name
    #[arg(
        long = "azure-environment",
        env = "AZURE_ENVIRONMENT",
        default_value = DEFAULT_AZURE_ENVIRONMENT
    )]
    #[serde(rename = "Environment")]
    pub environment: String,
}

impl Opts {
    /// Options as a single JSON line, logged at startup.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl LoggerOpts {
    pub fn max_level(&self) -> Level {
        if self.debug {
            Level::TRACE
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    /// Whether log lines carry the source file and line.
    pub fn report_caller(&self) -> bool {
        self.debug || self.log_json
    }
}

/// Process exit code for a failed parse. Help and version requests are not failures.
pub fn exit_code(error: &clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(args: &[&str]) -> Result<Opts, clap::Error> {
        Opts::try_parse_from(std::iter::once("azure-debug-info").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let opts = parse(&[]).unwrap();

        assert_eq!(opts.logger, LoggerOpts::default());
        assert_eq!(opts.azure.environment, DEFAULT_AZURE_ENVIRONMENT);
        assert_eq!(opts.logger.max_level(), Level::INFO);
    }

    #[test]
    fn flags() {
        let opts = parse(&["-v", "--log.json", "--azure-environment", "AzureChinaCloud"]).unwrap();

        assert!(opts.logger.verbose);
        assert!(opts.logger.log_json);
        assert!(!opts.logger.debug);
        assert_eq!(opts.azure.environment, "AzureChinaCloud");
        assert_eq!(opts.logger.max_level(), Level::DEBUG);
        assert!(opts.logger.report_caller());
    }

    #[test]
    fn debug_wins_over_verbose() {
        let opts = parse(&["--verbose", "--debug"]).unwrap();

        assert_eq!(opts.logger.max_level(), Level::TRACE);
        assert!(opts.logger.report_caller());
    }

    #[rstest]
    #[case::help(&["--help"], 0)]
    #[case::version(&["--version"], 0)]
    #[case::unknown_flag(&["--unknown"], 1)]
    #[case::unexpected_value(&["--verbose=maybe"], 1)]
    fn parse_failures_exit_codes(#[case] args: &[&str], #[case] expected: i32) {
        let error = parse(args).unwrap_err();
        assert_eq!(exit_code(&error), expected);
    }

    #[test]
    fn options_as_json() {
        let opts = parse(&["--debug"]).unwrap();

        let json: serde_json::Value = serde_json::from_str(&opts.to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "Logger": {"Debug": true, "Verbose": false, "LogJson": false},
                "Azure": {"Environment": "AZUREPUBLICCLOUD"}
            })
        );
    }
}
