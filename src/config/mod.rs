//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheConfig, EmbeddingConfig, LogFormat, LoggingConfig, ServerConfig,
    StoreSettings, UpstreamConfig, WriteBackSettings,
};
