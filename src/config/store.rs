use crate::domain::model::PrefValue;
use crate::domain::ports::ConfigStore;
use crate::utils::error::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tokio::sync::watch;

/// 記憶體中的偏好設定，每個 key 一條 watch channel
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<HashMap<String, watch::Sender<Option<PrefValue>>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, PrefValue)>,
        K: Into<String>,
    {
        let entries = values
            .into_iter()
            .map(|(key, value)| (key.into(), watch::Sender::new(Some(value))))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// 目前所有已設定的值（依 key 排序）
    pub fn values(&self) -> BTreeMap<String, PrefValue> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter_map(|(key, sender)| sender.borrow().clone().map(|value| (key.clone(), value)))
            .collect()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|sender| sender.borrow().clone())
    }

    fn set(&self, key: &str, value: PrefValue) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(sender) => {
                sender.send_replace(Some(value));
            }
            None => {
                entries.insert(key.to_string(), watch::Sender::new(Some(value)));
            }
        }
        tracing::debug!("Preference {} updated", key);
        Ok(())
    }

    fn subscribe(&self, key: &str) -> watch::Receiver<Option<PrefValue>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(key.to_string())
            .or_insert_with(|| watch::Sender::new(None))
            .subscribe()
    }
}
