use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;

use zeus::config::settings::WorkerConfig;
use zeus::infrastructure::redis::store::RedisJobStore;
use zeus::modules::files::resolver::OutputResolver;
use zeus::shutdown::install_shutdown_handler;
use zeus::workers::generator::CommandGenerator;
use zeus::workers::inference::InferenceWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    zeus::init_tracing();

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    let store = RedisJobStore::connect(&config.store)
        .await
        .context("failed to connect to the job store")?;

    tokio::fs::create_dir_all(&config.generated_root)
        .await
        .with_context(|| format!("failed to create {}", config.generated_root.display()))?;

    info!(
        "Worker {} listening on queue '{}'",
        config.instance_id, config.store.queue_key
    );

    let worker = InferenceWorker::new(
        config.instance_id.clone(),
        Arc::new(store),
        Arc::new(CommandGenerator::new(
            config.generator_command.clone(),
            config.generator_args.clone(),
        )),
        OutputResolver::new(config.generated_root.clone()),
        config.generation.clone(),
        config.backoff,
    );

    worker.run(install_shutdown_handler()).await;
    Ok(())
}
