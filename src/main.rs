use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docqa::config::AppConfig;
use docqa::{build_app, build_state};

#[derive(Parser, Debug)]
#[command(name = "docqa-server", version, about = "Document question-answering service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "docqa.toml")]
    config: String,

    /// Override the listen host
    #[arg(long, env = "DOCQA_HOST")]
    host: Option<String>,

    /// Override the listen port
    #[arg(long, env = "DOCQA_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = build_state(config)?;
    let app = build_app(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
