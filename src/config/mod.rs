#[cfg(feature = "cli")]
pub mod cli;
pub mod store;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use store::MemoryConfigStore;
pub use toml_config::{ClientFileConfig, FileConfigStore};

use crate::domain::model::{
    EnhancementSettings, PrefValue, DENOISER_SIGMA_MAX, DENOISER_SIGMA_MIN,
};
use crate::domain::ports::ConfigStore;
use crate::utils::error::{EnhanceError, Result};
use crate::utils::validation::validate_range;
use std::sync::Arc;

pub const KEY_ENABLED: &str = "pref_enhancement_enabled";
pub const KEY_BASE_URL: &str = "pref_enhancement_base_url";
pub const KEY_USE_DENOISER: &str = "pref_enhancement_use_denoiser";
pub const KEY_USE_COLORIZER: &str = "pref_enhancement_use_colorizer";
pub const KEY_USE_UPSCALER: &str = "pref_enhancement_use_upscaler";
pub const KEY_DENOISER_SIGMA: &str = "pref_enhancement_denoiser_sigma";
pub const KEY_USE_SERVER_CACHE: &str = "pref_enhancement_use_server_cache";

pub const ALL_KEYS: [&str; 7] = [
    KEY_ENABLED,
    KEY_BASE_URL,
    KEY_USE_DENOISER,
    KEY_USE_COLORIZER,
    KEY_USE_UPSCALER,
    KEY_DENOISER_SIGMA,
    KEY_USE_SERVER_CACHE,
];

/// 可以存進 [`ConfigStore`] 的型別
pub trait PrefType: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    fn from_pref(value: &PrefValue) -> Option<Self>;
    fn into_pref(self) -> PrefValue;
}

impl PrefType for bool {
    fn from_pref(value: &PrefValue) -> Option<Self> {
        match value {
            PrefValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn into_pref(self) -> PrefValue {
        PrefValue::Bool(self)
    }
}

impl PrefType for i32 {
    fn from_pref(value: &PrefValue) -> Option<Self> {
        match value {
            // 超出 i32 的值先夾到邊界，交給各設定自己的範圍檢查
            PrefValue::Int(v) => Some((*v).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32),
            _ => None,
        }
    }

    fn into_pref(self) -> PrefValue {
        PrefValue::Int(i64::from(self))
    }
}

impl PrefType for String {
    fn from_pref(value: &PrefValue) -> Option<Self> {
        match value {
            PrefValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn into_pref(self) -> PrefValue {
        PrefValue::Text(self)
    }
}

/// 帶預設值的型別化偏好設定 key
#[derive(Debug, Clone)]
pub struct Preference<T> {
    key: &'static str,
    default: T,
}

impl<T: PrefType> Preference<T> {
    pub fn new(key: &'static str, default: T) -> Self {
        Self { key, default }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn default_value(&self) -> T {
        self.default.clone()
    }

    /// 型別不符或不存在時回傳預設值
    pub fn resolve(&self, raw: Option<&PrefValue>) -> T {
        match raw {
            Some(value) => T::from_pref(value).unwrap_or_else(|| {
                tracing::warn!(
                    "⚠️ Preference {} has unexpected value {:?}, using default {:?}",
                    self.key,
                    value,
                    self.default
                );
                self.default.clone()
            }),
            None => self.default.clone(),
        }
    }

    pub fn get(&self, store: &dyn ConfigStore) -> T {
        self.resolve(store.get(self.key).as_ref())
    }

    pub fn set(&self, store: &dyn ConfigStore, value: T) -> Result<()> {
        store.set(self.key, value.into_pref())
    }
}

/// 增強功能的七個偏好設定
#[derive(Clone)]
pub struct EnhancementPreferences {
    store: Arc<dyn ConfigStore>,
}

impl EnhancementPreferences {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn enabled() -> Preference<bool> {
        Preference::new(KEY_ENABLED, false)
    }

    pub fn base_url() -> Preference<String> {
        Preference::new(KEY_BASE_URL, String::new())
    }

    pub fn use_denoiser() -> Preference<bool> {
        Preference::new(KEY_USE_DENOISER, true)
    }

    pub fn use_colorizer() -> Preference<bool> {
        Preference::new(KEY_USE_COLORIZER, true)
    }

    pub fn use_upscaler() -> Preference<bool> {
        Preference::new(KEY_USE_UPSCALER, false)
    }

    pub fn denoiser_sigma() -> Preference<i32> {
        Preference::new(KEY_DENOISER_SIGMA, 25)
    }

    pub fn use_server_cache() -> Preference<bool> {
        Preference::new(KEY_USE_SERVER_CACHE, true)
    }

    /// 直接從 store 讀出一份設定
    pub fn settings(&self) -> EnhancementSettings {
        let store = self.store.as_ref();
        EnhancementSettings {
            enabled: Self::enabled().get(store),
            base_url: Self::base_url().get(store),
            use_denoiser: Self::use_denoiser().get(store),
            use_colorizer: Self::use_colorizer().get(store),
            use_upscaler: Self::use_upscaler().get(store),
            denoiser_sigma: clamp_sigma(Self::denoiser_sigma().get(store)),
            use_server_cache: Self::use_server_cache().get(store),
        }
    }

    pub fn set_enabled(&self, value: bool) -> Result<()> {
        Self::enabled().set(self.store.as_ref(), value)
    }

    pub fn set_base_url(&self, value: impl Into<String>) -> Result<()> {
        Self::base_url().set(self.store.as_ref(), value.into())
    }

    pub fn set_use_denoiser(&self, value: bool) -> Result<()> {
        Self::use_denoiser().set(self.store.as_ref(), value)
    }

    pub fn set_use_colorizer(&self, value: bool) -> Result<()> {
        Self::use_colorizer().set(self.store.as_ref(), value)
    }

    pub fn set_use_upscaler(&self, value: bool) -> Result<()> {
        Self::use_upscaler().set(self.store.as_ref(), value)
    }

    /// 範圍與設定頁滑桿一致：0..=150
    pub fn set_denoiser_sigma(&self, value: i32) -> Result<()> {
        validate_range(KEY_DENOISER_SIGMA, value, DENOISER_SIGMA_MIN, DENOISER_SIGMA_MAX)?;
        Self::denoiser_sigma().set(self.store.as_ref(), value)
    }

    pub fn set_use_server_cache(&self, value: bool) -> Result<()> {
        Self::use_server_cache().set(self.store.as_ref(), value)
    }

    /// 以字串設定任一 key（CLI `config set` 使用）
    pub fn set_raw(&self, key: &str, raw: &str) -> Result<()> {
        match key {
            KEY_ENABLED => self.set_enabled(parse_bool(key, raw)?),
            KEY_BASE_URL => self.set_base_url(raw.trim()),
            KEY_USE_DENOISER => self.set_use_denoiser(parse_bool(key, raw)?),
            KEY_USE_COLORIZER => self.set_use_colorizer(parse_bool(key, raw)?),
            KEY_USE_UPSCALER => self.set_use_upscaler(parse_bool(key, raw)?),
            KEY_DENOISER_SIGMA => {
                let value = raw.trim().parse::<i32>().map_err(|e| {
                    EnhanceError::InvalidConfigValueError {
                        field: key.to_string(),
                        value: raw.to_string(),
                        reason: format!("Expected an integer: {}", e),
                    }
                })?;
                self.set_denoiser_sigma(value)
            }
            KEY_USE_SERVER_CACHE => self.set_use_server_cache(parse_bool(key, raw)?),
            _ => Err(EnhanceError::InvalidConfigValueError {
                field: "key".to_string(),
                value: key.to_string(),
                reason: format!("Unknown preference. Valid keys: {}", ALL_KEYS.join(", ")),
            }),
        }
    }
}

pub(crate) fn clamp_sigma(value: i32) -> i32 {
    let clamped = value.clamp(DENOISER_SIGMA_MIN, DENOISER_SIGMA_MAX);
    if clamped != value {
        tracing::warn!(
            "⚠️ {} = {} is out of range, clamped to {}",
            KEY_DENOISER_SIGMA,
            value,
            clamped
        );
    }
    clamped
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EnhanceError::InvalidConfigValueError {
            field: key.to_string(),
            value: raw.to_string(),
            reason: "Expected a boolean (true/false)".to_string(),
        }),
    }
}
