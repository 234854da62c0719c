use crate::core::codec::{build_request, decode_image_data};
use crate::core::transport::TransportPolicy;
use crate::domain::model::{EnhancedImage, EnhancementResult, EnhancementSettings, PageMetadata};
use crate::domain::ports::ImageEnhancer;
use crate::utils::error::{EnhanceError, Result};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tokio_util::sync::CancellationToken;

pub const ENHANCE_PATH: &str = "/colorize-image-data";

/// 增強伺服器的客戶端。
///
/// 不持有任何請求狀態，可在多個任務間共用；內部的 `reqwest::Client`
/// 由 [`TransportPolicy`] 建立，不會和其他連線共用。
#[derive(Debug, Clone)]
pub struct EnhancementClient {
    client: Client,
    policy: TransportPolicy,
}

impl EnhancementClient {
    pub fn new(policy: TransportPolicy) -> Result<Self> {
        let client = policy.build_client()?;
        Ok(Self { client, policy })
    }

    /// 以應用程式既有的 builder 為基礎（proxy、預設 header、連線池設定），
    /// 再套用 `policy`。憑證驗證仍只在 policy 明確要求時才關閉。
    pub fn with_builder(builder: ClientBuilder, policy: TransportPolicy) -> Result<Self> {
        let client = policy.apply(builder).build()?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &TransportPolicy {
        &self.policy
    }

    /// 盡力而為：任何失敗都記錄後回傳 `None`，原圖維持顯示。
    ///
    /// 呼叫端負責檢查 `settings.enabled`。
    pub async fn enhance(
        &self,
        metadata: &PageMetadata,
        image_bytes: &[u8],
        settings: &EnhancementSettings,
    ) -> Option<EnhancementResult> {
        match self.try_enhance(metadata, image_bytes, settings).await {
            Ok(result) => Some(result),
            Err(e) => {
                log_failure(metadata, &e);
                None
            }
        }
    }

    /// 同 [`enhance`](Self::enhance)，但 token 取消時立即放棄進行中的請求
    pub async fn enhance_cancellable(
        &self,
        metadata: &PageMetadata,
        image_bytes: &[u8],
        settings: &EnhancementSettings,
        cancel: &CancellationToken,
    ) -> Option<EnhancementResult> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_failure(metadata, &EnhanceError::Cancelled);
                None
            }
            result = self.enhance(metadata, image_bytes, settings) => result,
        }
    }

    /// 回傳具體錯誤，供診斷使用
    pub async fn try_enhance(
        &self,
        metadata: &PageMetadata,
        image_bytes: &[u8],
        settings: &EnhancementSettings,
    ) -> Result<EnhancementResult> {
        let endpoint = endpoint_url(&settings.base_url)?;
        let request = build_request(metadata, image_bytes, settings);

        tracing::debug!(
            "📡 Sending {} bytes of {:?} to {}",
            image_bytes.len(),
            metadata.image_name,
            endpoint
        );

        let response = self.client.post(&endpoint).json(&request).send().await?;
        let status = response.status();
        tracing::debug!("📡 Enhancement response status: {}", status);

        if !status.is_success() {
            return Err(EnhanceError::HttpStatusError {
                status,
                url: endpoint,
            });
        }

        let body = response.bytes().await?;
        let enhanced: EnhancedImage = serde_json::from_slice(&body)?;
        let image_data = decode_image_data(&enhanced.color_image_data)?;

        tracing::debug!(
            "✅ Enhanced {:?}: {} bytes -> {} bytes",
            metadata.image_name,
            image_bytes.len(),
            image_data.len()
        );

        Ok(EnhancementResult { image_data })
    }
}

#[async_trait]
impl ImageEnhancer for EnhancementClient {
    async fn enhance(
        &self,
        metadata: &PageMetadata,
        image_bytes: &[u8],
        settings: &EnhancementSettings,
    ) -> Option<EnhancementResult> {
        EnhancementClient::enhance(self, metadata, image_bytes, settings).await
    }
}

/// `{base_url}/colorize-image-data`，base URL 結尾的 `/` 會被忽略
pub fn endpoint_url(base_url: &str) -> Result<String> {
    let base = base_url.trim();
    if base.is_empty() {
        return Err(EnhanceError::MissingConfigError {
            field: "base_url".to_string(),
        });
    }
    validate_url("base_url", base)?;
    Ok(format!("{}{}", base.trim_end_matches('/'), ENHANCE_PATH))
}

fn log_failure(metadata: &PageMetadata, error: &EnhanceError) {
    match error {
        EnhanceError::Cancelled => {
            tracing::debug!("Enhancement of {:?} cancelled", metadata.image_name)
        }
        e if e.is_config_error() => {
            tracing::error!("❌ Enhancement not attempted for {:?}: {}", metadata.image_name, e)
        }
        e => tracing::warn!("⚠️ Enhancement failed for {:?}: {}", metadata.image_name, e),
    }
}
