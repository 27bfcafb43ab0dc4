//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BackendConfig, ConfigError, Environment, LivechatConfig, LogConfig,
};
