use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DENOISER_SIGMA_MIN: i32 = 0;
pub const DENOISER_SIGMA_MAX: i32 = 150;

/// 偏好設定儲存的值型別
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl std::fmt::Display for PrefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefValue::Bool(v) => write!(f, "{}", v),
            PrefValue::Int(v) => write!(f, "{}", v),
            PrefValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// 單一時間點的增強設定快照。
///
/// `enabled = false` 時呼叫端不可發出任何增強請求。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementSettings {
    pub enabled: bool,
    pub base_url: String,
    pub use_denoiser: bool,
    pub use_colorizer: bool,
    pub use_upscaler: bool,
    pub denoiser_sigma: i32,
    pub use_server_cache: bool,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            use_denoiser: true,
            use_colorizer: true,
            use_upscaler: false,
            denoiser_sigma: 25,
            use_server_cache: true,
        }
    }
}

/// 頁面的描述資訊，隨圖片一起送到增強伺服器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub image_name: Option<String>,
    pub image_url: Option<String>,
    pub source_id: Option<String>,
    pub title: String,
    pub chapter_label: String,
}

impl PageMetadata {
    /// 由閱讀器頁面資訊組出 metadata：
    /// 名稱用頁碼，圖片網址缺少時退回頁面網址。
    pub fn for_page(
        page_index: usize,
        image_url: Option<&str>,
        page_url: &str,
        scanlator: Option<&str>,
        manga_id: i64,
        chapter_name: &str,
    ) -> Self {
        Self {
            image_name: Some(page_index.to_string()),
            image_url: Some(image_url.unwrap_or(page_url).to_string()),
            source_id: scanlator.map(str::to_string),
            title: manga_id.to_string(),
            chapter_label: chapter_name.to_string(),
        }
    }
}

/// 已解碼（尚未 base64）的頁面圖片
#[derive(Debug, Clone)]
pub struct PageImage {
    pub metadata: PageMetadata,
    pub data: Arc<[u8]>,
}

impl PageImage {
    pub fn new(metadata: PageMetadata, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            metadata,
            data: data.into(),
        }
    }
}

/// 送往 `/colorize-image-data` 的請求內容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementRequest {
    #[serde(rename = "imgName")]
    pub image_name: Option<String>,
    #[serde(rename = "imgData")]
    pub image_data: String,
    #[serde(rename = "imgURL")]
    pub image_url: Option<String>,
    #[serde(rename = "mangaSource")]
    pub source_id: Option<String>,
    #[serde(rename = "mangaTitle")]
    pub title: String,
    #[serde(rename = "mangaChapter")]
    pub chapter_label: String,
    pub colorize: bool,
    pub denoise: bool,
    pub upscale: bool,
    #[serde(rename = "denoiseSigma")]
    pub denoise_sigma: i32,
    pub cache: bool,
}

/// 伺服器回應，`colorImgData` 為 base64 圖片
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnhancedImage {
    #[serde(rename = "colorImgData")]
    pub color_image_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementResult {
    pub image_data: Vec<u8>,
}
