use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_VERIFICATION_TTL_SECONDS: &str = "verification-ttl-seconds";
pub const ARG_INSECURE_COOKIES: &str = "insecure-cookies";
pub const ARG_ARGON2_MEMORY_KIB: &str = "argon2-memory-kib";
pub const ARG_ARGON2_ITERATIONS: &str = "argon2-iterations";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub verification_ttl_seconds: i64,
    pub secure_cookies: bool,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Options {
    /// Parse session and credential arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_JWT_SECRET}"))?;

        let number = |id: &str, default: u32| matches.get_one::<u32>(id).copied().unwrap_or(default);

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::auth::session::DEFAULT_SESSION_TTL_SECONDS),
            verification_ttl_seconds: matches
                .get_one::<i64>(ARG_VERIFICATION_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::store::verification::DEFAULT_CODE_TTL_SECONDS),
            secure_cookies: !matches.get_flag(ARG_INSECURE_COOKIES),
            argon2_memory_kib: number(ARG_ARGON2_MEMORY_KIB, argon2::Params::DEFAULT_M_COST),
            argon2_iterations: number(ARG_ARGON2_ITERATIONS, argon2::Params::DEFAULT_T_COST),
            argon2_parallelism: number(ARG_ARGON2_PARALLELISM, argon2::Params::DEFAULT_P_COST),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_argon2_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long("jwt-secret")
                .help("Secret used to sign session tokens (at least 32 bytes)")
                .env("ZERO_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long("session-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("ZERO_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_TTL_SECONDS)
                .long("verification-ttl-seconds")
                .help("Email verification code TTL in seconds")
                .env("ZERO_VERIFICATION_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIES)
                .long("insecure-cookies")
                .help("Drop the Secure attribute from the session cookie (local development)")
                .env("ZERO_INSECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
}

fn with_argon2_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ARGON2_MEMORY_KIB)
                .long("argon2-memory-kib")
                .help("Argon2id memory cost in KiB")
                .env("ZERO_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_ITERATIONS)
                .long("argon2-iterations")
                .help("Argon2id iteration count")
                .env("ZERO_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long("argon2-parallelism")
                .help("Argon2id degree of parallelism")
                .env("ZERO_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn clean_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [
                ("ZERO_JWT_SECRET", None::<&str>),
                ("ZERO_SESSION_TTL_SECONDS", None),
                ("ZERO_VERIFICATION_TTL_SECONDS", None),
                ("ZERO_INSECURE_COOKIES", None),
                ("ZERO_ARGON2_MEMORY_KIB", None),
                ("ZERO_ARGON2_ITERATIONS", None),
                ("ZERO_ARGON2_PARALLELISM", None),
            ],
            f,
        );
    }

    #[test]
    fn defaults_match_argon2_and_session_constants() {
        clean_env(|| {
            let matches = with_args(Command::new("zero"))
                .get_matches_from(vec!["zero", "--jwt-secret", "s3cr3t"]);
            let options = Options::parse(&matches);
            assert!(options.is_ok());
            if let Ok(options) = options {
                assert_eq!(options.jwt_secret.expose_secret(), "s3cr3t");
                assert_eq!(options.session_ttl_seconds, 43_200);
                assert_eq!(options.verification_ttl_seconds, 900);
                assert!(options.secure_cookies);
                assert_eq!(options.argon2_memory_kib, argon2::Params::DEFAULT_M_COST);
                assert_eq!(options.argon2_iterations, argon2::Params::DEFAULT_T_COST);
                assert_eq!(options.argon2_parallelism, argon2::Params::DEFAULT_P_COST);
            }
        });
    }

    #[test]
    fn insecure_cookies_flag() {
        clean_env(|| {
            let matches = with_args(Command::new("zero")).get_matches_from(vec![
                "zero",
                "--jwt-secret",
                "s3cr3t",
                "--insecure-cookies",
            ]);
            let options = Options::parse(&matches);
            assert!(options.is_ok_and(|options| !options.secure_cookies));
        });
    }

    #[test]
    fn zero_ttl_is_rejected() {
        clean_env(|| {
            let result = with_args(Command::new("zero")).try_get_matches_from(vec![
                "zero",
                "--jwt-secret",
                "s3cr3t",
                "--session-ttl-seconds",
                "0",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn blank_secret_is_rejected() {
        clean_env(|| {
            let matches = with_args(Command::new("zero"))
                .get_matches_from(vec!["zero", "--jwt-secret", "  "]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --jwt-secret"));
            }
        });
    }
}
