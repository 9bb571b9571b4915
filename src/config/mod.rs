//! Загрузка конфигурации движка.

pub mod settings;

pub use settings::EngineConfig;
