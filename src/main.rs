use clap::Parser;
use completion_bridge::config::config_search_paths;
use completion_bridge::{build_router, proxy, AppState, BridgeConfig, SharedJournal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "completion-bridge",
    about = "OpenAI-compatible chat completion bridge for reasoning-model inference APIs",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Request journal path (JSONL)
    #[arg(long, default_value = "completion-bridge.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "completion_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut file_config = BridgeConfig::find_and_load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        file_config.port = port;
    }

    // Secrets are read once here; a missing one aborts startup.
    let config = file_config.resolve()?;
    let journal = SharedJournal::open(&cli.log_file)?;
    let client = proxy::build_client(&config)?;

    info!("completion-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", config.upstream_url);
    info!("  Model:     {} (all requests)", config.upstream_model);
    info!("  Listed:    {} models", config.models.len());
    info!("  Port:      {}", config.port);
    info!("  Journal:   {}", cli.log_file.display());

    journal.info(
        "startup",
        format!(
            "Starting completion-bridge upstream={} model={} port={}",
            config.upstream_url, config.upstream_model, config.port
        ),
    );

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        config,
        client,
        journal,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
