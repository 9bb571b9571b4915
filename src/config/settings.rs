use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Лимиты движка. Для каждого поля 0 означает «без ограничений».
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Максимальное общее число пар (подписчик, тема).
    pub max_subscriptions: usize,
    /// Глубина pull-очереди; при переполнении вытесняется самое старое
    /// сообщение.
    pub max_queue_depth: usize,
    /// Максимальный размер содержимого сообщения в байтах.
    pub max_message_size: usize,
}

impl EngineConfig {
    /// Значения по умолчанию + переменные окружения с префиксом `PUBSUB_`
    /// (например `PUBSUB_MAX_QUEUE_DEPTH=1024`).
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Как [`EngineConfig::load`], но сначала читает файл (toml/json/yaml по
    /// расширению). Переменные окружения перекрывают файл.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("PUBSUB")
        .prefix_separator("_")
        .try_parsing(true)
}
