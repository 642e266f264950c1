use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USER: &str = "smtp-user";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_FROM: &str = "smtp-from";

#[derive(Debug)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub from: String,
}

/// Without `--smtp-host` emails are only logged.
#[derive(Debug)]
pub struct Options {
    pub smtp: Option<SmtpOptions>,
}

impl Options {
    /// Parse SMTP arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a relay host is given without credentials or sender.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(host) = get_non_empty(ARG_SMTP_HOST) else {
            return Ok(Self { smtp: None });
        };

        let read_required = |id: &str| -> anyhow::Result<String> {
            get_non_empty(id).ok_or_else(|| {
                anyhow::anyhow!("missing required argument: --{id} (required with --{ARG_SMTP_HOST})")
            })
        };

        Ok(Self {
            smtp: Some(SmtpOptions {
                host,
                port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(587),
                user: read_required(ARG_SMTP_USER)?,
                password: SecretString::from(read_required(ARG_SMTP_PASSWORD)?),
                from: read_required(ARG_SMTP_FROM)?,
            }),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long("smtp-host")
                .help("SMTP relay host; emails are only logged when unset")
                .env("ZERO_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long("smtp-port")
                .help("SMTP relay port (STARTTLS)")
                .env("ZERO_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USER)
                .long("smtp-user")
                .help("SMTP username")
                .env("ZERO_SMTP_USER"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long("smtp-password")
                .help("SMTP password")
                .env("ZERO_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long("smtp-from")
                .help("Sender address, e.g. \"Zero <no-reply@zero.dev>\"")
                .env("ZERO_SMTP_FROM"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cleared_smtp_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [
                ("ZERO_SMTP_HOST", None::<&str>),
                ("ZERO_SMTP_PORT", None),
                ("ZERO_SMTP_USER", None),
                ("ZERO_SMTP_PASSWORD", None),
                ("ZERO_SMTP_FROM", None),
            ],
            f,
        );
    }

    #[test]
    fn no_host_means_log_only() {
        with_cleared_smtp_env(|| {
            let matches = with_args(Command::new("zero")).get_matches_from(vec!["zero"]);
            let options = Options::parse(&matches);
            assert!(options.is_ok_and(|options| options.smtp.is_none()));
        });
    }

    #[test]
    fn host_requires_credentials() {
        with_cleared_smtp_env(|| {
            let matches = with_args(Command::new("zero")).get_matches_from(vec![
                "zero",
                "--smtp-host",
                "smtp.zero.dev",
                "--smtp-user",
                "mailer",
            ]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--smtp-password"));
            }
        });
    }

    #[test]
    fn full_smtp_config() {
        with_cleared_smtp_env(|| {
            let matches = with_args(Command::new("zero")).get_matches_from(vec![
                "zero",
                "--smtp-host",
                "smtp.zero.dev",
                "--smtp-port",
                "2525",
                "--smtp-user",
                "mailer",
                "--smtp-password",
                "hunter2",
                "--smtp-from",
                "Zero <no-reply@zero.dev>",
            ]);
            let options = Options::parse(&matches);
            assert!(options.is_ok());
            if let Ok(Options { smtp: Some(smtp) }) = options {
                assert_eq!(smtp.host, "smtp.zero.dev");
                assert_eq!(smtp.port, 2525);
                assert_eq!(smtp.user, "mailer");
                assert_eq!(smtp.from, "Zero <no-reply@zero.dev>");
            } else {
                panic!("expected SMTP options");
            }
        });
    }
}
