use anyhow::{Context, Result};
use iam_bff_config::AppConfig;
use iam_bff_keycloak::IamServices;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Installs the global `fmt` subscriber. `RUST_LOG` overrides the default
    /// `info` filter.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub iam: IamServices,
}

impl BackendServices {
    /// Wires the forwarding services. No provider call is made here, so the
    /// server starts even while the identity provider is still booting.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let iam = IamServices::from_config(config)
            .context("failed to build identity provider client")?;

        let settings = iam.keycloak.settings();
        info!(
            server_url = %settings.server_url,
            realm = %settings.realm,
            client_id = %settings.client_id,
            "identity provider client ready"
        );

        Ok(Self { iam })
    }

    /// Obtains an admin token to prove the provider is reachable and the admin
    /// credentials are accepted.
    pub async fn check_identity_provider(&self) -> Result<()> {
        self.iam
            .keycloak
            .tokens()
            .admin_token()
            .await
            .context("identity provider check failed")?;

        info!("identity provider accepted the admin credentials");
        Ok(())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
