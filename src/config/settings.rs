use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::env::{self, Env, EnvKey};

const DEFAULT_INSTANCE_ID: &str = "unknown-instance";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration values: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Where the shared queue and status maps live.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    pub redis_url: String,
    pub queue_key: String,
    pub status_key: String,
}

impl StoreConfig {
    /// Key of the handler attribution map.
    pub fn metadata_key(&self) -> String {
        format!("{}:metadata", self.status_key)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub store: StoreConfig,
    pub generated_root: PathBuf,
    pub ready_file: Option<PathBuf>,
    pub building_file: Option<PathBuf>,
    pub instance_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::from_process)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env::new(lookup);
        let mut missing = Vec::new();

        let store = store_config(&env, &mut missing);
        let generated_root = env.require(EnvKey::GeneratedRoot, &mut missing);

        let (Some(store), Some(generated_root)) = (store, generated_root) else {
            return Err(ConfigError::Missing(missing));
        };

        Ok(Self {
            server_host: env.get_or(EnvKey::ServerHost, "0.0.0.0"),
            server_port: env.get_parsed(EnvKey::ServerPort, 5000)?,
            store,
            generated_root: PathBuf::from(generated_root),
            ready_file: env.get(EnvKey::ModelReadyFile).map(PathBuf::from),
            building_file: env.get(EnvKey::ModelBuildingFile).map(PathBuf::from),
            instance_id: instance_id(&env),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Parameters handed to the video generator for every job.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GenerationSettings {
    pub model_path: PathBuf,
    pub device: String,
    pub frames: u32,
    pub fps: u32,
    pub height: u32,
    pub width: u32,
    pub inference_steps: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkerConfig {
    pub store: StoreConfig,
    pub generated_root: PathBuf,
    pub instance_id: String,
    pub generator_command: String,
    pub generator_args: Vec<String>,
    pub generation: GenerationSettings,
    pub backoff: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::from_process)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env::new(lookup);
        let mut missing = Vec::new();

        let store = store_config(&env, &mut missing);
        let generated_root = env.require(EnvKey::GeneratedRoot, &mut missing);
        let generator_command = env.require(EnvKey::GeneratorCommand, &mut missing);
        let model_path = env.require(EnvKey::ModelPath, &mut missing);
        let device = env.require(EnvKey::Device, &mut missing);
        let frames = env.require(EnvKey::NumFrames, &mut missing);
        let fps = env.require(EnvKey::OutputFps, &mut missing);
        let height = env.require(EnvKey::Height, &mut missing);
        let width = env.require(EnvKey::Width, &mut missing);
        let steps = env.require(EnvKey::InferenceSteps, &mut missing);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let (
            Some(store),
            Some(generated_root),
            Some(generator_command),
            Some(model_path),
            Some(device),
            Some(frames),
            Some(fps),
            Some(height),
            Some(width),
            Some(steps),
        ) = (
            store,
            generated_root,
            generator_command,
            model_path,
            device,
            frames,
            fps,
            height,
            width,
            steps,
        )
        else {
            return Err(ConfigError::Missing(missing));
        };

        let model_path = PathBuf::from(model_path);
        if !model_path.exists() {
            return Err(ConfigError::Invalid {
                key: EnvKey::ModelPath.as_str(),
                reason: format!("model directory {} does not exist", model_path.display()),
            });
        }

        let generation = GenerationSettings {
            model_path,
            device,
            frames: env::parse(EnvKey::NumFrames, &frames)?,
            fps: env::parse(EnvKey::OutputFps, &fps)?,
            height: env::parse(EnvKey::Height, &height)?,
            width: env::parse(EnvKey::Width, &width)?,
            inference_steps: env::parse(EnvKey::InferenceSteps, &steps)?,
        };

        let generator_args = env
            .get(EnvKey::GeneratorArgs)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            store,
            generated_root: PathBuf::from(generated_root),
            instance_id: instance_id(&env),
            generator_command,
            generator_args,
            generation,
            backoff: Duration::from_secs(env.get_parsed(EnvKey::WorkerBackoffSecs, 5)?),
        })
    }
}

fn store_config<F>(env: &Env<F>, missing: &mut Vec<&'static str>) -> Option<StoreConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let redis_url = env.require(EnvKey::RedisUrl, missing);
    let queue_key = env.require(EnvKey::RedisQueueKey, missing);
    let status_key = env.require(EnvKey::RedisStatusKey, missing);

    Some(StoreConfig {
        redis_url: redis_url?,
        queue_key: queue_key?,
        status_key: status_key?,
    })
}

/// Explicit `INSTANCE_ID`, else the host name.
fn instance_id<F>(env: &Env<F>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    env.get(EnvKey::InstanceId)
        .or_else(|| env.get(EnvKey::Hostname))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_INSTANCE_ID.to_string())
}
