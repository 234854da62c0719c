use crate::domain::model::{EnhancementResult, EnhancementSettings, PageMetadata, PrefValue};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::watch;

/// 持久化的 key-value 偏好設定，每個 key 可獨立訂閱變更。
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<PrefValue>;

    fn set(&self, key: &str, value: PrefValue) -> Result<()>;

    /// 回傳該 key 的訂閱端；之後每次 `set` 都會通知，即使值沒有改變
    fn subscribe(&self, key: &str) -> watch::Receiver<Option<PrefValue>>;
}

/// 盡力而為的圖片增強：任何失敗都以 `None` 表示。
#[async_trait]
pub trait ImageEnhancer: Send + Sync {
    async fn enhance(
        &self,
        metadata: &PageMetadata,
        image_bytes: &[u8],
        settings: &EnhancementSettings,
    ) -> Option<EnhancementResult>;
}
