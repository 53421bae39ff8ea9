//! Mural - image upload service
//!
//! Accepts base64 JPEG uploads, stores them under `containerFiles/artifacts`
//! and serves paginated listings of what has been uploaded.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mural_backend::{
    api::{app_router, AppState, RouterOptions},
    artifact::{
        ArtifactRepository, ArtifactService, InMemoryArtifactRepository, OsFs,
        SqliteArtifactRepository,
    },
    config::{Config, RepositoryKind},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();

    info!("🖼️  Mural artifact service starting");

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    let repository = build_repository(&config)?;
    info!(
        "💾 Existing artifacts in repository: {}",
        repository.count().context("Failed to count artifacts")?
    );

    let fs = OsFs::new(&config.data_dir);
    info!(
        "📁 Storing images in: {}",
        fs.root().join(&config.storage_prefix).display()
    );

    let service = ArtifactService::new(Arc::new(fs), repository)
        .with_storage_prefix(config.storage_prefix.clone());

    let index_page = config.index_page();
    match &index_page {
        Some(page) => info!("📄 Serving upload page from: {}", page.display()),
        None => warn!(
            "Upload page {} not found, / will return 404",
            config.index_page.display()
        ),
    }

    let app = app_router(
        AppState::new(service),
        RouterOptions {
            max_upload_bytes: config.max_upload_bytes,
            index_page,
        },
    );

    // Start server
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("🎯 API server listening on {}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn build_repository(config: &Config) -> Result<Arc<dyn ArtifactRepository>> {
    let page_size = config.page_size();
    match config.repository {
        RepositoryKind::Sqlite => {
            let db_path = config.db_path();
            let repo = SqliteArtifactRepository::new(&db_path, page_size).with_context(|| {
                format!("Failed to open artifact database {}", db_path.display())
            })?;
            info!("📊 Database initialized at: {}", db_path.display());
            Ok(Arc::new(repo))
        }
        RepositoryKind::Memory => {
            warn!("Using in-memory repository; records are lost on restart");
            Ok(Arc::new(InMemoryArtifactRepository::new(page_size)))
        }
    }
}

/// Initialize tracing with enhanced observability
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mural_backend=debug,mural=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate's own .env when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
