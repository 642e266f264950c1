use clap::{builder::ValueParser, Arg, ArgMatches, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        match matches.get_one::<String>(ARG_LOG_FORMAT).map(String::as_str) {
            Some("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("ZERO_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Log output format")
                .env("ZERO_LOG_FORMAT")
                .default_value("pretty")
                .value_parser(["pretty", "json"]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_pretty() {
        temp_env::with_vars([("ZERO_LOG_FORMAT", None::<&str>)], || {
            let matches = with_args(Command::new("zero")).get_matches_from(vec!["zero"]);
            assert_eq!(LogFormat::parse(&matches), LogFormat::Pretty);
        });
    }

    #[test]
    fn log_format_json() {
        let matches = with_args(Command::new("zero"))
            .get_matches_from(vec!["zero", "--log-format", "json"]);
        assert_eq!(LogFormat::parse(&matches), LogFormat::Json);
    }

    #[test]
    fn log_format_rejects_unknown() {
        let result = with_args(Command::new("zero"))
            .try_get_matches_from(vec!["zero", "--log-format", "xml"]);
        assert!(result.is_err());
    }
}
