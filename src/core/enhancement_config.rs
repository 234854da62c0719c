use crate::config::{clamp_sigma, EnhancementPreferences, Preference, PrefType};
use crate::domain::model::EnhancementSettings;
use crate::domain::ports::ConfigStore;
use crate::utils::error::{EnhanceError, Result};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
struct ConfigFields {
    enabled: AtomicBool,
    base_url: RwLock<String>,
    use_denoiser: AtomicBool,
    use_colorizer: AtomicBool,
    use_upscaler: AtomicBool,
    denoiser_sigma: AtomicI32,
    use_server_cache: AtomicBool,
}

#[derive(Default)]
struct Shared {
    fields: ConfigFields,
    listener: RwLock<Option<ChangeListener>>,
}

impl Shared {
    fn notify(&self) {
        // 先複製出來，避免在持鎖狀態下呼叫 listener
        let listener = self
            .listener
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

/// 增強設定在記憶體中的鏡像，跟著 [`ConfigStore`] 的變更即時更新。
///
/// 每個 key 各自一個背景任務：收到新值就寫入欄位，值和上一次不同時
/// 呼叫 change listener。欄位各自是原子的，但多個欄位之間沒有一致性保證。
/// 任務綁在建構時傳入的 `scope` 上，`scope` 取消、呼叫 [`shutdown`](Self::shutdown)
/// 或 drop 時全部停止。
pub struct EnhancementConfig {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EnhancementConfig {
    /// 需在 Tokio runtime 內呼叫
    pub fn new(store: Arc<dyn ConfigStore>, scope: &CancellationToken) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| EnhanceError::RuntimeError {
            message: format!("EnhancementConfig requires a Tokio runtime: {}", e),
        })?;

        let shared = Arc::new(Shared::default());
        let cancel = scope.child_token();
        let store = store.as_ref();

        let tasks = vec![
            register(&handle, store, &shared, &cancel, EnhancementPreferences::enabled(), |f, v| {
                f.enabled.store(v, Ordering::Release);
                v
            }),
            register(&handle, store, &shared, &cancel, EnhancementPreferences::base_url(), |f, v| {
                let mut base_url = f.base_url.write().unwrap_or_else(|e| e.into_inner());
                base_url.clone_from(&v);
                v
            }),
            register(&handle, store, &shared, &cancel, EnhancementPreferences::use_denoiser(), |f, v| {
                f.use_denoiser.store(v, Ordering::Release);
                v
            }),
            register(&handle, store, &shared, &cancel, EnhancementPreferences::use_colorizer(), |f, v| {
                f.use_colorizer.store(v, Ordering::Release);
                v
            }),
            register(&handle, store, &shared, &cancel, EnhancementPreferences::use_upscaler(), |f, v| {
                f.use_upscaler.store(v, Ordering::Release);
                v
            }),
            register(&handle, store, &shared, &cancel, EnhancementPreferences::denoiser_sigma(), |f, v| {
                let v = clamp_sigma(v);
                f.denoiser_sigma.store(v, Ordering::Release);
                v
            }),
            register(&handle, store, &shared, &cancel, EnhancementPreferences::use_server_cache(), |f, v| {
                f.use_server_cache.store(v, Ordering::Release);
                v
            }),
        ];

        tracing::debug!("EnhancementConfig watching {} preferences", tasks.len());

        Ok(Self {
            shared,
            cancel,
            tasks,
        })
    }

    pub fn set_change_listener<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut slot = self.shared.listener.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(listener));
    }

    pub fn clear_change_listener(&self) {
        let mut slot = self.shared.listener.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    pub fn enabled(&self) -> bool {
        self.shared.fields.enabled.load(Ordering::Acquire)
    }

    pub fn base_url(&self) -> String {
        self.shared
            .fields
            .base_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn use_denoiser(&self) -> bool {
        self.shared.fields.use_denoiser.load(Ordering::Acquire)
    }

    pub fn use_colorizer(&self) -> bool {
        self.shared.fields.use_colorizer.load(Ordering::Acquire)
    }

    pub fn use_upscaler(&self) -> bool {
        self.shared.fields.use_upscaler.load(Ordering::Acquire)
    }

    pub fn denoiser_sigma(&self) -> i32 {
        self.shared.fields.denoiser_sigma.load(Ordering::Acquire)
    }

    pub fn use_server_cache(&self) -> bool {
        self.shared.fields.use_server_cache.load(Ordering::Acquire)
    }

    /// 各欄位的最新值；欄位之間可能在讀取途中被更新
    pub fn snapshot(&self) -> EnhancementSettings {
        EnhancementSettings {
            enabled: self.enabled(),
            base_url: self.base_url(),
            use_denoiser: self.use_denoiser(),
            use_colorizer: self.use_colorizer(),
            use_upscaler: self.use_upscaler(),
            denoiser_sigma: self.denoiser_sigma(),
            use_server_cache: self.use_server_cache(),
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 取消所有訂閱並等待背景任務結束
    pub async fn close(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("⚠️ Preference watcher ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for EnhancementConfig {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for EnhancementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementConfig")
            .field("settings", &self.snapshot())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// 先同步讀入目前的值，再啟動背景任務處理後續變更。
/// `assign` 寫入欄位並回傳實際存下的值（例如被夾限過的 sigma）。
fn register<T, F>(
    handle: &Handle,
    store: &dyn ConfigStore,
    shared: &Arc<Shared>,
    cancel: &CancellationToken,
    pref: Preference<T>,
    assign: F,
) -> JoinHandle<()>
where
    T: PrefType,
    F: Fn(&ConfigFields, T) -> T + Send + Sync + 'static,
{
    let mut rx = store.subscribe(pref.key());
    let initial = rx.borrow_and_update().clone();
    let mut last = assign(&shared.fields, pref.resolve(initial.as_ref()));

    let shared = Arc::clone(shared);
    let cancel = cancel.clone();

    handle.spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let raw = rx.borrow_and_update().clone();
            let value = assign(&shared.fields, pref.resolve(raw.as_ref()));
            if value != last {
                tracing::debug!("Preference {} changed: {:?} -> {:?}", pref.key(), last, value);
                last = value;
                shared.notify();
            }
        }
        tracing::debug!("Stopped watching {}", pref.key());
    })
}
