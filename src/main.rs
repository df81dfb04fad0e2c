use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bookfinder::api::create_router;
use bookfinder::browser::ChromiumLauncher;
use bookfinder::config::Config;
use bookfinder::extraction::ExtractionSchema;
use bookfinder::service::SearchService;
use bookfinder::target::SearchTarget;

#[derive(Parser, Debug)]
#[command(name = "bookfinder", about = "Find where to buy a book")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default)
    Serve(ServeArgs),
    /// Run a single search and print the results as JSON
    Search {
        /// Book title to look for
        #[arg(required = true, num_args = 1..)]
        book_name: Vec<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,
    /// Directory holding the search page
    #[arg(long)]
    static_dir: Option<PathBuf>,
    /// Chrome or Chromium binary
    #[arg(long)]
    chrome: Option<PathBuf>,
    /// Browser sessions allowed at once
    #[arg(long)]
    max_sessions: Option<usize>,
    /// Seconds to wait for the results page to render
    #[arg(long)]
    navigation_timeout: Option<u64>,
}

impl ServeArgs {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if let Some(chrome) = self.chrome {
            config.chrome_executable = Some(chrome);
        }
        if let Some(n) = self.max_sessions {
            config.max_concurrent_sessions = n;
        }
        if let Some(secs) = self.navigation_timeout {
            config.navigation_timeout = Duration::from_secs(secs);
        }
    }
}

fn build_service(config: &Config) -> Result<SearchService<ChromiumLauncher>> {
    let target = SearchTarget::new(&config.search_url_template)?;
    let schemas = ExtractionSchema::compile_all(&config.extraction_schemas)
        .context("invalid extraction schema")?;
    let filter = config.relevance_mode.build(&config.marketplace_tokens);

    Ok(SearchService::new(
        ChromiumLauncher::new(config.browser_settings()),
        target,
        schemas,
        filter,
        config.limits(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Also picks up `log` records from the library modules.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => {
            args.apply(&mut config);
            serve(config).await
        }
        Command::Search { book_name } => {
            let service = build_service(&config)?;
            let results = service.search(Some(&book_name.join(" "))).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let service = Arc::new(build_service(&config)?);
    let app = create_router(service, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
