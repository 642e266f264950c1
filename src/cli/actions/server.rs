use crate::{
    api::{self, rate_limit, Components},
    auth::{AuthFlow, PasswordHasher, SessionIssuer},
    billing::{CheckoutProvider, CustomerProvisioner, NoopProvisioner, Payments, StripeClient},
    cli::commands,
    clock::{SharedClock, SystemClock},
    email::{EmailSender, LogEmailSender, SmtpEmailSender},
    store::{self, UserStore, VerificationStore},
};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub api_version: String,
    pub frontend_origin: Option<String>,
    pub app_name: String,
    pub auth: commands::auth::Options,
    pub email: commands::email::Options,
    pub billing: commands::billing::Options,
    pub rate_limit: commands::rate_limit::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be opened, a component is misconfigured, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let port = args.port;
    let components = components(args, Arc::new(SystemClock)).await?;
    api::new(port, components).await
}

/// Build every shared component once from the parsed arguments.
///
/// # Errors
/// Returns an error if the database cannot be opened or a component is misconfigured.
pub async fn components(args: Args, clock: SharedClock) -> Result<Components> {
    debug!("Server args: {:?}", args);

    let pool = store::connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;
    store::apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let users = UserStore::new(pool.clone(), clock.clone());
    let codes = VerificationStore::new(pool.clone(), clock.clone()).with_ttl(
        chrono::Duration::seconds(args.auth.verification_ttl_seconds),
    );

    let hasher = PasswordHasher::new(
        args.auth.argon2_memory_kib,
        args.auth.argon2_iterations,
        args.auth.argon2_parallelism,
    )
    .map_err(|err| anyhow!("Invalid Argon2 parameters: {err}"))?;

    let sessions = SessionIssuer::new(
        &args.auth.jwt_secret,
        args.auth.session_ttl_seconds,
        args.auth.secure_cookies,
        clock.clone(),
    )
    .context("Invalid session configuration")?;

    let mailer: Arc<dyn EmailSender> = match &args.email.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "Sending email over SMTP");
            Arc::new(SmtpEmailSender::new(
                &smtp.host,
                smtp.port,
                &smtp.user,
                &smtp.password,
                &smtp.from,
            )?)
        }
        None => {
            info!("SMTP not configured, emails are only logged");
            Arc::new(LogEmailSender)
        }
    };

    let (provisioner, checkout): (Arc<dyn CustomerProvisioner>, Option<Arc<dyn CheckoutProvider>>) =
        match args.billing.secret_key {
            Some(secret_key) => {
                let client = Arc::new(StripeClient::new(
                    secret_key,
                    &args.billing.domain,
                    &args.billing.api_base,
                )?);
                let provisioner: Arc<dyn CustomerProvisioner> = client.clone();
                let checkout: Arc<dyn CheckoutProvider> = client;
                (provisioner, Some(checkout))
            }
            None => {
                info!("Stripe not configured, checkout is disabled");
                (Arc::new(NoopProvisioner), None)
            }
        };
    let payments = Payments::new(checkout, args.billing.webhook_secret, clock);

    let rate_limiter =
        rate_limit::from_config(args.rate_limit.requests, args.rate_limit.window_seconds);

    let flow = AuthFlow::new(users, codes, hasher, sessions, provisioner, mailer)
        .with_app_name(args.app_name);

    Ok(Components {
        pool,
        flow: Arc::new(flow),
        payments: Arc::new(payments),
        rate_limiter,
        api_version: args.api_version,
        frontend_origin: args.frontend_origin,
    })
}
