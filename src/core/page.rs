use crate::core::codec::is_animated;
use crate::core::enhancement_config::EnhancementConfig;
use crate::domain::model::{EnhancementResult, PageImage};
use crate::domain::ports::ImageEnhancer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 閱讀器頁面這一側的呼叫端：決定要不要送增強、何時放棄。
///
/// 每個 `PageEnhancer` 擁有一個取消範圍，對應一個頁面視圖的生命週期；
/// [`shutdown`](Self::shutdown) 或 drop 時，所有進行中的請求都會被取消。
pub struct PageEnhancer<E: ImageEnhancer> {
    enhancer: Arc<E>,
    config: Arc<EnhancementConfig>,
    scope: CancellationToken,
}

impl<E: ImageEnhancer + 'static> PageEnhancer<E> {
    pub fn new(enhancer: Arc<E>, config: Arc<EnhancementConfig>) -> Self {
        Self::with_scope(enhancer, config, CancellationToken::new())
    }

    /// 範圍是 `parent` 的子 token：父範圍取消時跟著停止，
    /// 但這個 enhancer 的 shutdown 或 drop 只會取消自己的請求。
    pub fn with_scope(
        enhancer: Arc<E>,
        config: Arc<EnhancementConfig>,
        parent: CancellationToken,
    ) -> Self {
        Self {
            enhancer,
            config,
            scope: parent.child_token(),
        }
    }

    pub fn config(&self) -> &Arc<EnhancementConfig> {
        &self.config
    }

    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// 未啟用、動態圖或已關閉時直接回傳 `None`，不會呼叫 enhancer
    pub async fn enhance_page(&self, page: &PageImage) -> Option<EnhancementResult> {
        attempt(
            self.enhancer.as_ref(),
            self.config.as_ref(),
            page,
            &self.scope,
        )
        .await
    }

    /// 在背景執行一次增強；回傳的 task 被 drop 時請求會被取消。
    ///
    /// 與 [`EnhancementConfig::new`] 相同，需在 Tokio runtime 內呼叫，否則會 panic。
    pub fn spawn(&self, page: PageImage) -> EnhancementTask {
        let cancel = self.scope.child_token();
        let enhancer = Arc::clone(&self.enhancer);
        let config = Arc::clone(&self.config);
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            attempt(enhancer.as_ref(), config.as_ref(), &page, &task_cancel).await
        });

        EnhancementTask { handle, cancel }
    }

    pub fn shutdown(&self) {
        self.scope.cancel();
    }
}

impl<E: ImageEnhancer> Drop for PageEnhancer<E> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

async fn attempt<E: ImageEnhancer + ?Sized>(
    enhancer: &E,
    config: &EnhancementConfig,
    page: &PageImage,
    cancel: &CancellationToken,
) -> Option<EnhancementResult> {
    if cancel.is_cancelled() {
        return None;
    }

    let settings = config.snapshot();
    if !settings.enabled {
        return None;
    }

    if is_animated(&page.data) {
        tracing::debug!("Skipping animated page {:?}", page.metadata.image_name);
        return None;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("Enhancement of {:?} cancelled", page.metadata.image_name);
            None
        }
        result = enhancer.enhance(&page.metadata, &page.data, &settings) => result,
    }
}

/// 一次背景增強。`join` 取得結果，`cancel` 或 drop 會中止請求。
#[derive(Debug)]
pub struct EnhancementTask {
    handle: JoinHandle<Option<EnhancementResult>>,
    cancel: CancellationToken,
}

impl EnhancementTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(mut self) -> Option<EnhancementResult> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("⚠️ Enhancement task failed: {}", e);
                None
            }
        }
    }
}

impl Drop for EnhancementTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::domain::model::{EnhancementSettings, PageMetadata};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ImageEnhancer for Echo {
        async fn enhance(
            &self,
            _metadata: &PageMetadata,
            image_bytes: &[u8],
            _settings: &EnhancementSettings,
        ) -> Option<EnhancementResult> {
            Some(EnhancementResult {
                image_data: image_bytes.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn test_scope_is_a_child_of_parent() {
        let parent = CancellationToken::new();
        let config = Arc::new(
            EnhancementConfig::new(Arc::new(MemoryConfigStore::new()), &parent).unwrap(),
        );

        let enhancer = PageEnhancer::with_scope(Arc::new(Echo), config, parent.clone());
        enhancer.shutdown();
        assert!(enhancer.scope().is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    #[should_panic]
    fn test_spawn_requires_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = {
            let _guard = runtime.enter();
            EnhancementConfig::new(Arc::new(MemoryConfigStore::new()), &CancellationToken::new())
                .unwrap()
        };

        let enhancer = PageEnhancer::new(Arc::new(Echo), Arc::new(config));
        let _task = enhancer.spawn(PageImage::new(PageMetadata::default(), vec![1u8]));
    }
}
