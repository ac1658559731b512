//! es-log-agent: ask a self-hosted model questions about Elasticsearch logs
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use es_log_agent::{
    agent::build_agent,
    config::{self, Backend, Settings},
    mcp::{render_invoke_reply, send_raw_invoke},
    network::HttpClient,
    repl,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "es-log-agent")]
#[command(version)]
#[command(about = "Answer questions about Elasticsearch logs with a local model", long_about = None)]
struct Cli {
    /// Settings file (otherwise $ES_AGENT_SETTINGS_PATH or the usual locations)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// How Elasticsearch is reached: rest or mcp
    #[arg(long, global = true, value_name = "BACKEND")]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Interactive console
    Repl,

    /// Answer one question and exit
    Ask { question: String },

    /// Run a connection test, then log a heartbeat until Ctrl-C
    Probe,

    /// POST a raw `invoke` request to an MCP route and print the reply
    Invoke {
        /// MCP route (defaults to mcp.route_url / $MCP_ROUTE_URL)
        #[arg(long)]
        url: Option<String>,

        #[arg(default_value = "Show me recent error logs")]
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting es-log-agent v{}", es_log_agent::VERSION);

    let mut settings = config::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        settings.agent.backend = backend;
    }

    match cli.command {
        Commands::Serve { port, bind } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(bind) = bind {
                settings.server.bind_address = bind;
            }
            serve(settings).await
        }
        Commands::Repl => {
            let agent = build_agent(&settings).await?;
            let result = repl::run_repl(&agent).await;
            agent.shutdown().await;
            result
        }
        Commands::Ask { question } => {
            let agent = build_agent(&settings).await?;
            let result = agent.run(&question).await;
            agent.shutdown().await;
            println!("{}", result?);
            Ok(())
        }
        Commands::Probe => {
            let agent = build_agent(&settings).await?;
            let result = repl::run_probe(&agent).await;
            agent.shutdown().await;
            result
        }
        Commands::Invoke { url, question } => {
            let url = url
                .or_else(|| settings.mcp.route_url.clone())
                .context("no MCP route: pass --url or set MCP_ROUTE_URL")?;
            let http = if settings.mcp.verify_ssl {
                HttpClient::with_settings(&settings.outgoing)?
            } else {
                HttpClient::with_settings(&settings.outgoing)?.insecure()?
            };
            let (status, body) = send_raw_invoke(&http, &url, &question).await?;
            println!("{}", render_invoke_reply(status, &body));
            Ok(())
        }
    }
}

async fn serve(settings: Settings) -> Result<()> {
    let agent = build_agent(&settings).await?;

    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);
    let state = AppState::new(agent);
    let app = create_router(state.clone());

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;

    state.agent.shutdown().await;
    Ok(())
}
