pub mod auth;
pub mod billing;
pub mod email;
pub mod logging;
pub mod rate_limit;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_API_VERSION: &str = "api-version";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";
pub const ARG_APP_NAME: &str = "app-name";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("zero")
        .about("Accounts, email verification and checkout")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("ZERO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .long_help(
                    "SQLite connection string. The database file is created if it does not exist; use sqlite::memory: for a throwaway database.",
                )
                .default_value("sqlite://zero.db")
                .env("ZERO_DSN"),
        )
        .arg(
            Arg::new(ARG_API_VERSION)
                .long("api-version")
                .help("API version, routes are mounted under /api/v<version>")
                .default_value(crate::api::DEFAULT_API_VERSION)
                .env("ZERO_API_VERSION"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long("frontend-origin")
                .help("Frontend URL allowed by CORS with credentials")
                .env("ZERO_FRONTEND_ORIGIN"),
        )
        .arg(
            Arg::new(ARG_APP_NAME)
                .long("app-name")
                .help("Application name used in outgoing emails")
                .default_value("Zero")
                .env("ZERO_APP_NAME"),
        );

    let command = auth::with_args(command);
    let command = email::with_args(command);
    let command = billing::with_args(command);
    let command = rate_limit::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "zero");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Accounts, email verification and checkout".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("ZERO_PORT", None::<&str>),
                ("ZERO_DSN", None),
                ("ZERO_API_VERSION", None),
                ("ZERO_APP_NAME", None),
                ("ZERO_FRONTEND_ORIGIN", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["zero", "--jwt-secret", SECRET]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<String>(ARG_DSN).cloned(),
                    Some("sqlite://zero.db".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_API_VERSION).cloned(),
                    Some("1".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_APP_NAME).cloned(),
                    Some("Zero".to_string())
                );
                assert!(matches.get_one::<String>(ARG_FRONTEND_ORIGIN).is_none());
            },
        );
    }

    #[test]
    fn test_check_port_and_dsn() {
        let matches = new().get_matches_from(vec![
            "zero",
            "--port",
            "9090",
            "--dsn",
            "sqlite::memory:",
            "--jwt-secret",
            SECRET,
        ]);

        assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9090));
        assert_eq!(
            matches.get_one::<String>(ARG_DSN).cloned(),
            Some("sqlite::memory:".to_string())
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("ZERO_PORT", Some("443")),
                ("ZERO_DSN", Some("sqlite:///var/lib/zero/zero.db")),
                ("ZERO_JWT_SECRET", Some(SECRET)),
                ("ZERO_FRONTEND_ORIGIN", Some("https://app.zero.dev")),
                ("ZERO_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["zero"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_DSN).cloned(),
                    Some("sqlite:///var/lib/zero/zero.db".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_FRONTEND_ORIGIN).cloned(),
                    Some("https://app.zero.dev".to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("ZERO_LOG_LEVEL", Some(level)),
                    ("ZERO_JWT_SECRET", Some(SECRET)),
                ],
                || {
                    let matches = new().get_matches_from(vec!["zero"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("ZERO_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "zero".to_string(),
                    "--jwt-secret".to_string(),
                    SECRET.to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_unknown_args_fail() {
        let result = new().try_get_matches_from(vec![
            "zero",
            "--jwt-secret",
            SECRET,
            "--redis-url",
            "redis://localhost:6379",
        ]);
        assert_eq!(
            result.map_err(|e| e.kind()),
            Err(clap::error::ErrorKind::UnknownArgument)
        );
    }

    #[test]
    fn test_jwt_secret_required() {
        temp_env::with_vars([("ZERO_JWT_SECRET", None::<&str>)], || {
            let result = new().try_get_matches_from(vec!["zero"]);
            assert_eq!(
                result.map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
