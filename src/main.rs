use std::sync::Arc;

use clap::{Parser, Subcommand};

mod app;
mod auth;
mod cache;
mod config;
mod db;
mod digest;
mod error;
mod mailer;
mod market;
mod state;
mod stocks;
mod subscription;
mod users;
mod watchlist;

#[cfg(test)]
mod testing;

use crate::{digest::DigestJob, state::AppState};

#[derive(Parser)]
#[command(name = "marketpulse", version, about = "MarketPulse API server and daily digest")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API (default).
    Serve,
    /// Run the daily news digest once and exit.
    Digest,
    /// Verify the database is reachable.
    CheckDb,
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "marketpulse=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let app_state = AppState::init().await?;

    if let Some(Command::CheckDb) = cli.command {
        return match db::check_connection(&app_state.db).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "database connection failed");
                std::process::exit(1);
            }
        };
    }

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    if let Some(Command::Digest) = cli.command {
        let report = DigestJob::from_state(&app_state).run().await;
        tracing::info!(
            users = report.users,
            symbols = report.unique_symbols,
            sections = report.sections_built,
            sent = report.emails_sent,
            failed = report.failed_recipients.len(),
            "digest run complete"
        );
        return Ok(());
    }

    if app_state.config.digest.enabled {
        let job = Arc::new(DigestJob::from_state(&app_state));
        tokio::spawn(digest::scheduler::start_scheduler(
            job,
            app_state.config.digest.hour_utc,
        ));
    } else {
        tracing::info!("daily digest disabled");
    }

    app::serve(app::build_app(app_state)).await
}
