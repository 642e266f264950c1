//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, currently only the API
//! server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    auth, billing, email, rate_limit, ARG_API_VERSION, ARG_APP_NAME, ARG_DSN,
    ARG_FRONTEND_ORIGIN, ARG_PORT,
};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let api_version = matches
        .get_one::<String>(ARG_API_VERSION)
        .map(|v| v.trim().trim_start_matches('v').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| crate::api::DEFAULT_API_VERSION.to_string());
    let frontend_origin = matches
        .get_one::<String>(ARG_FRONTEND_ORIGIN)
        .cloned()
        .filter(|v| !v.trim().is_empty());
    let app_name = matches
        .get_one::<String>(ARG_APP_NAME)
        .cloned()
        .unwrap_or_else(|| "Zero".to_string());

    Ok(Action::Server(Args {
        port,
        dsn,
        api_version,
        frontend_origin,
        app_name,
        auth: auth::Options::parse(matches)?,
        email: email::Options::parse(matches)?,
        billing: billing::Options::parse(matches)?,
        rate_limit: rate_limit::Options::parse(matches),
    }))
}
