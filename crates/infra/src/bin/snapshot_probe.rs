//! Fetch one policy snapshot from the configured directory and print it as
//! JSON. Useful for checking what the engine will actually enforce.

use anyhow::Context;

use warden_infra::{HttpDirectory, LoaderConfig, SnapshotLoader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = LoaderConfig::from_env();
    tracing::info!(directory = %config.directory_url, "probing directory");

    let directory =
        HttpDirectory::from_config(&config).context("failed to build directory client")?;
    let (loader, authorizer) = SnapshotLoader::with_authorizer(directory, config);

    loader.refresh().await.context("failed to load policy snapshot")?;
    let snapshot = authorizer
        .snapshot()
        .context("snapshot missing after successful refresh")?;

    let json = serde_json::to_string_pretty(&snapshot.to_document())?;
    println!("{json}");
    Ok(())
}
