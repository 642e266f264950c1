use clap::{Arg, ArgMatches, Command};

use crate::api::rate_limit::{DEFAULT_REQUESTS, DEFAULT_WINDOW_SECONDS};

pub const ARG_RATE_LIMIT_REQUESTS: &str = "rate-limit-requests";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub requests: u32,
    pub window_seconds: i64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            requests: matches
                .get_one::<u32>(ARG_RATE_LIMIT_REQUESTS)
                .copied()
                .unwrap_or(DEFAULT_REQUESTS),
            window_seconds: matches
                .get_one::<i64>(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_WINDOW_SECONDS),
        }
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_REQUESTS)
                .long("rate-limit-requests")
                .help("Requests allowed per client IP and window, 0 disables limiting")
                .env("ZERO_RATE_LIMIT_REQUESTS")
                .default_value("50")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long("rate-limit-window-seconds")
                .help("Rate limit window in seconds")
                .env("ZERO_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
