use crate::config::store::MemoryConfigStore;
use crate::core::transport::TransportPolicy;
use crate::domain::model::PrefValue;
use crate::domain::ports::ConfigStore;
use crate::utils::error::{EnhanceError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// 設定檔內容：
///
/// ```toml
/// [preferences]
/// pref_enhancement_enabled = true
/// pref_enhancement_base_url = "https://192.168.1.20:8443"
///
/// [transport]
/// accept_invalid_certs = true
/// timeout_seconds = 60
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientFileConfig {
    #[serde(default)]
    pub preferences: BTreeMap<String, PrefValue>,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 自架伺服器使用自簽憑證時才開啟
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl TransportConfig {
    pub fn to_policy(&self) -> TransportPolicy {
        TransportPolicy {
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: self.timeout_seconds.map(Duration::from_secs),
            ..TransportPolicy::default()
        }
    }
}

impl Validate for TransportConfig {
    fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout_seconds {
            crate::utils::validation::validate_range("transport.timeout_seconds", timeout, 1, 3600)?;
        }
        Ok(())
    }
}

impl ClientFileConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnhanceError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EnhanceError::TomlError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| EnhanceError::TomlError {
            message: format!("TOML serialization error: {}", e),
        })
    }
}

impl Validate for ClientFileConfig {
    fn validate(&self) -> Result<()> {
        self.transport.validate()
    }
}

/// 以 TOML 檔案為後端的 [`ConfigStore`]，每次 `set` 都寫回檔案
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    inner: MemoryConfigStore,
    transport: TransportConfig,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    /// 檔案不存在時視為空設定
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = if path.exists() {
            let config = ClientFileConfig::from_file(&path)?;
            config.validate()?;
            config
        } else {
            tracing::debug!("Config file {} not found, starting empty", path.display());
            ClientFileConfig::default()
        };

        tracing::debug!(
            "Loaded {} preferences from {}",
            config.preferences.len(),
            path.display()
        );

        Ok(Self {
            path,
            inner: MemoryConfigStore::with_values(config.preferences),
            transport: config.transport,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn snapshot(&self) -> ClientFileConfig {
        ClientFileConfig {
            preferences: self.inner.values(),
            transport: self.transport.clone(),
        }
    }

    fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let content = self.snapshot().to_toml_string()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: PrefValue) -> Result<()> {
        self.inner.set(key, value)?;
        self.persist()
    }

    fn subscribe(&self, key: &str) -> watch::Receiver<Option<PrefValue>> {
        self.inner.subscribe(key)
    }
}
