use std::net::SocketAddr;

use blog_service::config::Config;
use blog_service::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blog_service=debug,tower_http=debug".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    tracing::info!(
        database = config.target_database(),
        admin_database = %config.admin_database,
        "Configuration loaded"
    );

    // Pool connects lazily; the database may not exist yet
    let state = AppState::from_config(config.clone());

    // `setup-database` subcommand: bootstrap once and exit
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("setup-database") {
        let report = state.init.ensure_schema().await?;
        println!(
            "Database \"{}\" ready: {} statements executed (script sha256 {})",
            report.database,
            report.statement_count(),
            report.script_sha256
        );
        return Ok(());
    }

    if config.bootstrap_on_startup {
        let init = state.init.clone();
        tokio::spawn(async move {
            // Failure is logged by the coordinator; requests re-trigger it.
            let _ = init.ensure_schema().await;
        });
    }

    // Build router
    let app = blog_service::routes::create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
