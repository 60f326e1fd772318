use std::env;
use std::str::FromStr;

use super::settings::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKey {
    ServerHost,
    ServerPort,
    RedisUrl,
    RedisQueueKey,
    RedisStatusKey,
    GeneratedRoot,
    ModelReadyFile,
    ModelBuildingFile,
    InstanceId,
    Hostname,
    GeneratorCommand,
    GeneratorArgs,
    ModelPath,
    Device,
    NumFrames,
    OutputFps,
    Height,
    Width,
    InferenceSteps,
    WorkerBackoffSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerHost => "APP_HOST",
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::RedisQueueKey => "REDIS_QUEUE_KEY",
            EnvKey::RedisStatusKey => "REDIS_STATUS_KEY",
            EnvKey::GeneratedRoot => "GENERATED_ROOT",
            EnvKey::ModelReadyFile => "MODEL_READY_FILE",
            EnvKey::ModelBuildingFile => "MODEL_BUILDING_FILE",
            EnvKey::InstanceId => "INSTANCE_ID",
            EnvKey::Hostname => "HOSTNAME",
            EnvKey::GeneratorCommand => "GENERATOR_COMMAND",
            EnvKey::GeneratorArgs => "GENERATOR_ARGS",
            EnvKey::ModelPath => "LTX_MODEL_ID",
            EnvKey::Device => "LTX_DEVICE",
            EnvKey::NumFrames => "LTX_NUM_FRAMES",
            EnvKey::OutputFps => "LTX_OUTPUT_FPS",
            EnvKey::Height => "LTX_HEIGHT",
            EnvKey::Width => "LTX_WIDTH",
            EnvKey::InferenceSteps => "LTX_INFERENCE_STEPS",
            EnvKey::WorkerBackoffSecs => "WORKER_BACKOFF_SECS",
        }
    }
}

/// Reads a configuration value from the process environment.
pub fn from_process(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Typed access over any `key -> value` lookup, so settings can be built from
/// the process environment or from a fixed map in tests.
pub struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Blank values count as unset.
    pub fn get(&self, key: EnvKey) -> Option<String> {
        (self.lookup)(key.as_str()).filter(|value| !value.trim().is_empty())
    }

    pub fn get_or(&self, key: EnvKey, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Records `key` in `missing` when it is unset.
    pub fn require(&self, key: EnvKey, missing: &mut Vec<&'static str>) -> Option<String> {
        let value = self.get(key);
        if value.is_none() {
            missing.push(key.as_str());
        }
        value
    }

    pub fn get_parsed<T: FromStr>(&self, key: EnvKey, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => parse(key, &raw),
            None => Ok(default),
        }
    }
}

pub fn parse<T: FromStr>(key: EnvKey, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key: key.as_str(),
        reason: format!("could not parse {raw:?}"),
    })
}
