use anyhow::Context;
use clap::{Parser, Subcommand};
use iam_bff_api::{build_router, AppState};
use iam_bff_config::load as load_config;
use iam_bff_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "iam-bff")]
#[command(about = "Identity backend-for-frontend in front of Keycloak (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Fetch an admin token to verify provider reachability and credentials
    Check,
    /// Print the effective configuration with secrets redacted
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Check => check().await,
        Commands::PrintConfig => print_config(),
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting IAM backend-for-frontend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let app = build_router(AppState::new(services.iam));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(iam_bff_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    services.check_identity_provider().await?;
    println!(
        "identity provider at {} accepted the admin credentials",
        config.keycloak.server_url
    );
    Ok(())
}

fn print_config() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let rendered = serde_json::to_string_pretty(&config.redacted())
        .context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
