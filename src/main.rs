use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use clap::Parser;
use github_mcp::config::{Settings, Transport};
use github_mcp::github::GithubClient;
use github_mcp::http::{self, ApiKey};
use github_mcp::server::McpGithubServer;
use rmcp::{transport::stdio, ServiceExt};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// MCP server for GitHub: repositories, files, issues, pull requests, Actions and more
#[derive(Parser)]
#[command(name = "github-mcp", version, about)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Transport to serve MCP over
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value = "http")]
    transport: Transport,

    /// Address to bind the HTTP server to
    #[arg(long, env = "MCP_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port for the HTTP server
    #[arg(long, env = "MCP_PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = cli.settings;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let github = GithubClient::connect(settings.token(), &settings.api_url)
        .map_err(|e| anyhow::anyhow!("Failed to create GitHub client: {}", e))?;

    if github.is_authenticated() {
        match github.get("/user", &[]).await {
            Ok(user) => {
                let login = user.get("login").and_then(Value::as_str).unwrap_or("unknown");
                tracing::info!(login, "Authenticated with GitHub");
            }
            Err(e) => tracing::warn!(error = %e, "GitHub token check failed; tools will report API errors"),
        }
    }

    let server = McpGithubServer::from_settings(github, &settings);
    let scope = server.scope();
    tracing::info!(
        default_owner = settings.default_owner.as_deref().unwrap_or("none"),
        default_repo = settings.default_repo.as_deref().unwrap_or("none"),
        allowed_repos = scope.allowed().patterns().len(),
        max_results = settings.max_results,
        "Starting {}",
        settings.server_name
    );

    match cli.transport {
        Transport::Stdio => {
            let running = server.serve(stdio()).await?;
            running.waiting().await?;
        }
        Transport::Http => {
            let api_key = ApiKey::new(settings.api_key());
            if api_key.is_enabled() {
                tracing::info!("API key authentication enabled on /mcp");
            } else {
                tracing::warn!("MCP_API_KEY is not set; /mcp accepts unauthenticated requests");
            }
            let app = http::router(server, api_key);
            http::serve(app, SocketAddr::new(cli.host, cli.port)).await?;
        }
    }

    Ok(())
}
