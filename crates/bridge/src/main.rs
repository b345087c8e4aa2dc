use color_eyre::eyre::{WrapErr, eyre};
use krb_oauth2_bridge::config::{AppConfig, config_path, load_config};
use krb_oauth2_bridge::store::{DbGrantStore, GrantStore, MemoryGrantStore};
use krb_oauth2_bridge::{ClientValidator, WhoamiClient};
use rustls::crypto::{self, CryptoProvider};
use sea_orm::Database;
use secrecy::SecretString;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Session secret of the client being probed.
const SESSION_ENV: &str = "IPA_SESSION";

fn initialize_standard_tracing() {
    let default_directives = "krb_oauth2_bridge=info,hyper=warn,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

async fn probe<S: GrantStore>(
    config: &AppConfig,
    store: S,
    client_id: &str,
    session: Option<SecretString>,
) -> color_eyre::Result<bool> {
    let verifier = WhoamiClient::new(&config.identity).wrap_err("Cannot set up identity endpoint")?;
    tracing::info!(endpoint = %verifier.endpoint(), realm = %config.realm, "Probing client");

    let validator = ClientValidator::new(
        config.realm.clone(),
        verifier,
        store,
        config.oauth2.client_cache(),
        config.oauth2.lifetimes(),
    );

    let accepted = validator
        .validate_client_id(client_id, session.as_ref())
        .await;

    println!("client_id: {client_id}");
    println!("decision: {}", if accepted { "accept" } else { "reject" });
    if let Some(redirect) = validator.get_default_redirect_uri(client_id) {
        let usable = validator.validate_redirect_uri(client_id, &redirect);
        println!("default_redirect_uri: {redirect} ({})", if usable { "ok" } else { "rejected" });
    }
    Ok(accepted)
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    initialize_standard_tracing();

    let client_id = env::args()
        .nth(1)
        .ok_or_else(|| eyre!("usage: krb-oauth2-bridge <client_id>  (session secret in ${SESSION_ENV})"))?;

    let config = load_config().wrap_err_with(|| format!("Failed to load {}", config_path()))?;

    CryptoProvider::install_default(crypto::ring::default_provider())
        .map_err(|_| eyre!("Failed to install crypto provider"))?;

    let session = env::var(SESSION_ENV).ok().map(SecretString::from);
    if session.is_none() {
        tracing::warn!("{SESSION_ENV} is not set, the client cannot prove its identity");
    }

    let accepted = match &config.database_url {
        Some(url) => {
            let db = Arc::new(
                Database::connect(url)
                    .await
                    .wrap_err("Failed to connect to database")?,
            );
            probe(&config, DbGrantStore::new(db), &client_id, session).await?
        }
        None => probe(&config, MemoryGrantStore::new(), &client_id, session).await?,
    };

    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
