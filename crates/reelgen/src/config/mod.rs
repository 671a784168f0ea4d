pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, validate_config};
pub use schema::{
    AlignerConfig, Config, FanoutConfig, ImageServiceConfig, LogFormat, LoggingConfig,
    MusicConfig, OpenAiConfig, RetryConfig, SecretRef, ServiceMode, ServicesConfig,
    StitcherConfig, StockConfig, StockSearchConfig, TimeoutConfig,
};
