pub mod client;
pub mod codec;
pub mod enhancement_config;
pub mod page;
pub mod transport;

pub use crate::domain::model::{
    EnhancedImage, EnhancementRequest, EnhancementResult, EnhancementSettings, PageImage,
    PageMetadata, PrefValue,
};
pub use crate::domain::ports::{ConfigStore, ImageEnhancer};
pub use crate::utils::error::Result;
