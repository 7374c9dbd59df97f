//! Survey Express: branching survey delivery.
//!
//! `serve` (the default) hosts the response API; `take` walks a survey from
//! a running server in the terminal and submits the answers to it.

mod take;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use survey_api::{ApiServer, AppState, SurveyRepository};
use survey_core::config::AppConfig;
use survey_core::SurveyId;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "survey-express")]
#[command(about = "Branching survey delivery with batched response submission")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "SURVEY_EXPRESS__NODE_ID", global = true)]
    node_id: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// HTTP port (overrides config)
        #[arg(long, env = "SURVEY_EXPRESS__API__HTTP_PORT")]
        http_port: Option<u16>,

        /// Question feed to load at startup (overrides config)
        #[arg(long, env = "SURVEY_EXPRESS__SURVEY__FEED_PATH")]
        feed: Option<String>,

        /// Expose Prometheus metrics (overrides config)
        #[arg(long)]
        metrics: bool,
    },
    /// Answer a survey interactively against a running server
    Take {
        survey_id: SurveyId,

        /// Server base URL (overrides config)
        #[arg(long, env = "SURVEY_EXPRESS__CLIENT__BASE_URL")]
        base_url: Option<String>,

        /// Branch path marker sent with the submission
        #[arg(long)]
        branch: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, Some(Command::Take { .. }));

    // Keep the terminal clean while answering questions.
    let default_filter = if interactive {
        "survey_express=warn,survey_navigation=warn"
    } else {
        "survey_express=info,survey_api=info,survey_navigation=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }

    match cli.command.unwrap_or(Command::Serve {
        http_port: None,
        feed: None,
        metrics: false,
    }) {
        Command::Serve {
            http_port,
            feed,
            metrics,
        } => {
            if let Some(port) = http_port {
                config.api.http_port = port;
            }
            if feed.is_some() {
                config.survey.feed_path = feed;
            }
            config.metrics.enabled |= metrics;
            serve(config).await
        }
        Command::Take {
            survey_id,
            base_url,
            branch,
        } => {
            if let Some(url) = base_url {
                config.client.base_url = url;
            }
            take::run(&config.client, survey_id, branch).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Survey Express starting up");
    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        feed = ?config.survey.feed_path,
        max_sessions = config.survey.max_sessions,
        session_idle_secs = config.survey.session_idle_secs,
        "Configuration loaded"
    );

    let surveys = Arc::new(SurveyRepository::new());
    match &config.survey.feed_path {
        Some(path) => {
            let loaded = surveys.load_feed_file(path)?;
            info!(path = %path, surveys = loaded, "Question feed loaded");
        }
        None => warn!("No question feed configured; every survey will be unknown"),
    }

    let state = AppState::new(config.node_id.clone(), surveys, config.survey.max_sessions)
        .with_session_idle_ttl(Duration::from_secs(config.survey.session_idle_secs));
    let api_server = ApiServer::new(config.clone(), state);

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("Survey Express is ready to serve respondents");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}
