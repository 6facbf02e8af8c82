// Contact Cards - Web Server
// vCard delivery endpoint, contact page and JSON API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use contact_cards::{build_router, setup_database, verify_count, AppState, Config};

/// Contact Cards web server
#[derive(Parser, Debug)]
#[command(name = "contact-cards-server", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONTACT_CARDS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting contact-cards-server v{}", contact_cards::VERSION);

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // Open database
    let db_path = &config.storage.database_path;
    let conn = match Connection::open(db_path) {
        Ok(conn) => conn,
        Err(e) => {
            error!("Failed to open database {}: {}", db_path.display(), e);
            return Err(e.into());
        }
    };
    setup_database(&conn)?;
    info!(
        "✓ Database opened: {} ({} contact records)",
        db_path.display(),
        verify_count(&conn)?
    );
    info!("Media root: {}", config.storage.media_root.display());

    if config.site.debug {
        info!("Debug mode: vCards served with no-cache, AI opt-out header disabled");
    }

    let bind_addr = config.server.bind_addr.clone();
    let attachments = Arc::new(config.media_dir());
    let state = AppState::new(conn, attachments, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Server running on http://{}", bind_addr);
    info!("   vCard: http://{}/wme/vcard/<id>/", bind_addr);
    info!("   API:   http://{}/api/contacts", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
