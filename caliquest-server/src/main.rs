//! caliquest-server: gamified fitness-instruction backend
//!
//! Serves the player API (maps, levels, progress), the admin authoring API
//! and uploaded media from one process. `--promote-admin <email>` grants the
//! admin flag and exits without starting the server.

use anyhow::{anyhow, Context, Result};
use caliquest_common::api::auth::find_user_id;
use caliquest_common::blob::BlobStore;
use caliquest_common::config::{
    BootstrapConfig, LoggingConfig, RootFolderInitializer, RootFolderResolver, RuntimeSettings,
};
use caliquest_common::db::{init_database, profiles};
use caliquest_server::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "caliquest-server", version, about = "CaliQuest progression service")]
struct Args {
    /// Root folder holding the database and uploaded media
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grant admin privileges to the account with this email, then exit
    #[arg(long, value_name = "EMAIL")]
    promote_admin: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

async fn promote_admin(pool: &sqlx::SqlitePool, email: &str) -> Result<()> {
    let user_id = find_user_id(pool, email)
        .await?
        .ok_or_else(|| anyhow!("no account with email {}", email))?;
    profiles::set_admin(pool, user_id, true).await?;
    info!("Promoted {} ({}) to admin", email, user_id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new("caliquest-server")
        .with_cli_arg(args.root_folder.clone())
        .with_config_file(args.config.clone());
    let BootstrapConfig {
        root_folder,
        port,
        public_base_url,
        logging,
    } = resolver.bootstrap(args.port);

    init_tracing(&logging)?;

    // Log build identification immediately after tracing init
    info!(
        "Starting CaliQuest server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", root_folder.display());

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("Database ready: {}", db_path.display());
            pool
        }
        Err(e) => {
            error!("Failed to initialize database {}: {}", db_path.display(), e);
            return Err(e.into());
        }
    };

    if let Some(email) = args.promote_admin.as_deref() {
        return promote_admin(&pool, email).await;
    }

    let settings = RuntimeSettings::load(&pool).await?;
    info!(
        "Unlock enforcement {}",
        if settings.enforce_unlock { "enabled" } else { "disabled" }
    );
    info!("Map completion rule: {}", settings.map_completion_rule.as_str());

    let blobs = BlobStore::new(initializer.media_path(), public_base_url);
    let app = build_router(AppState::new(pool, blobs, settings));

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("caliquest-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
