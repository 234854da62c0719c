pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{EnhancementPreferences, FileConfigStore, MemoryConfigStore};
pub use core::{
    client::EnhancementClient,
    enhancement_config::EnhancementConfig,
    page::{EnhancementTask, PageEnhancer},
    transport::TransportPolicy,
};
pub use domain::model::{
    EnhancementResult, EnhancementSettings, PageImage, PageMetadata, PrefValue,
};
pub use domain::ports::{ConfigStore, ImageEnhancer};
pub use utils::error::{EnhanceError, Result};
