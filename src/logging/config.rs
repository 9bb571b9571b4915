use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Многострочный, для локальной отладки.
    Pretty,
    #[default]
    Compact,
    /// Одна JSON-строка на событие.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Настройки логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень по умолчанию (`trace`..`error`), если `RUST_LOG` не задан.
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Директива для `EnvFilter`: уровень для этого крейта, остальным `warn`.
    pub fn build_filter_directive(&self) -> String {
        format!("warn,pubsub_core={level},pubsub_demo={level}", level = self.level)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(format!("invalid log level '{other}'")),
        }
    }
}
