use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::billing::stripe::DEFAULT_API_BASE;

pub const ARG_STRIPE_SECRET_KEY: &str = "stripe-secret-key";
pub const ARG_STRIPE_WEBHOOK_SECRET: &str = "stripe-webhook-secret";
pub const ARG_STRIPE_DOMAIN: &str = "stripe-domain";
pub const ARG_STRIPE_API_BASE: &str = "stripe-api-base";

/// Payments stay disabled unless a secret key is given; webhooks need their own secret.
#[derive(Debug)]
pub struct Options {
    pub secret_key: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub domain: String,
    pub api_base: String,
}

impl Options {
    /// Parse billing arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a secret key is given without the public domain.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let secret_key = get_non_empty(ARG_STRIPE_SECRET_KEY).map(SecretString::from);
        let domain = get_non_empty(ARG_STRIPE_DOMAIN).unwrap_or_default();
        if secret_key.is_some() && domain.is_empty() {
            anyhow::bail!(
                "missing required argument: --{ARG_STRIPE_DOMAIN} (required with --{ARG_STRIPE_SECRET_KEY})"
            );
        }

        Ok(Self {
            secret_key,
            webhook_secret: get_non_empty(ARG_STRIPE_WEBHOOK_SECRET).map(SecretString::from),
            domain,
            api_base: get_non_empty(ARG_STRIPE_API_BASE)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_STRIPE_SECRET_KEY)
                .long("stripe-secret-key")
                .help("Stripe secret key; checkout is disabled when unset")
                .env("ZERO_STRIPE_SECRET_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_STRIPE_WEBHOOK_SECRET)
                .long("stripe-webhook-secret")
                .help("Stripe webhook signing secret")
                .env("ZERO_STRIPE_WEBHOOK_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_STRIPE_DOMAIN)
                .long("stripe-domain")
                .help("Public site URL used for the checkout success and failure redirects")
                .env("ZERO_STRIPE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_STRIPE_API_BASE)
                .long("stripe-api-base")
                .help("Stripe API base URL")
                .env("ZERO_STRIPE_API_BASE")
                .default_value(DEFAULT_API_BASE),
        )
}
