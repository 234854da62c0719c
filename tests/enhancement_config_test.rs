use page_enhance::config::{
    EnhancementPreferences, KEY_BASE_URL, KEY_DENOISER_SIGMA, KEY_ENABLED, KEY_USE_UPSCALER,
};
use page_enhance::{ConfigStore, EnhancementConfig, MemoryConfigStore, PrefValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Harness {
    prefs: EnhancementPreferences,
    store: Arc<MemoryConfigStore>,
    config: EnhancementConfig,
    changes: mpsc::UnboundedReceiver<()>,
    _scope: CancellationToken,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryConfigStore::new());
    let scope = CancellationToken::new();
    let config = EnhancementConfig::new(store.clone(), &scope).unwrap();

    let (tx, changes) = mpsc::unbounded_channel();
    config.set_change_listener(move || {
        let _ = tx.send(());
    });

    Harness {
        prefs: EnhancementPreferences::new(store.clone()),
        store,
        config,
        changes,
        _scope: scope,
    }
}

async fn next_change(changes: &mut mpsc::UnboundedReceiver<()>) {
    tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .expect("listener was not called")
        .expect("listener channel closed");
}

/// 給背景任務一點時間，確認沒有多餘的通知
async fn assert_quiet(changes: &mut mpsc::UnboundedReceiver<()>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(changes.try_recv().is_err(), "unexpected change notification");
}

#[tokio::test]
async fn test_defaults_before_any_change() {
    let mut h = harness();
    let settings = h.config.snapshot();
    assert!(!settings.enabled);
    assert_eq!(settings.base_url, "");
    assert!(settings.use_denoiser);
    assert!(settings.use_colorizer);
    assert!(!settings.use_upscaler);
    assert_eq!(settings.denoiser_sigma, 25);
    assert!(settings.use_server_cache);

    // 建構時讀入初始值不算變更
    assert_quiet(&mut h.changes).await;
}

#[tokio::test]
async fn test_sigma_changes_are_reflected_with_one_notification_each() {
    let mut h = harness();

    for sigma in [0, 1, 25, 74, 149, 150] {
        h.prefs.set_denoiser_sigma(sigma).unwrap();
        next_change(&mut h.changes).await;
        assert_eq!(h.config.denoiser_sigma(), sigma);
        assert_quiet(&mut h.changes).await;
    }
}

#[tokio::test]
async fn test_same_value_does_not_notify() {
    let mut h = harness();

    h.prefs.set_denoiser_sigma(25).unwrap();
    assert_quiet(&mut h.changes).await;

    h.prefs.set_denoiser_sigma(60).unwrap();
    next_change(&mut h.changes).await;
    assert_eq!(h.config.denoiser_sigma(), 60);

    h.prefs.set_denoiser_sigma(60).unwrap();
    assert_quiet(&mut h.changes).await;
    assert_eq!(h.config.denoiser_sigma(), 60);
}

#[tokio::test]
async fn test_one_key_change_leaves_other_fields_untouched() {
    let mut h = harness();
    let before = h.config.snapshot();

    h.prefs.set_base_url("https://enhancer.local").unwrap();
    next_change(&mut h.changes).await;

    let after = h.config.snapshot();
    assert_eq!(after.base_url, "https://enhancer.local");
    assert_eq!(after.enabled, before.enabled);
    assert_eq!(after.use_denoiser, before.use_denoiser);
    assert_eq!(after.use_colorizer, before.use_colorizer);
    assert_eq!(after.use_upscaler, before.use_upscaler);
    assert_eq!(after.denoiser_sigma, before.denoiser_sigma);
    assert_eq!(after.use_server_cache, before.use_server_cache);
    assert_quiet(&mut h.changes).await;
}

#[tokio::test]
async fn test_every_key_is_watched() {
    let mut h = harness();

    h.prefs.set_enabled(true).unwrap();
    next_change(&mut h.changes).await;
    h.prefs.set_use_denoiser(false).unwrap();
    next_change(&mut h.changes).await;
    h.prefs.set_use_colorizer(false).unwrap();
    next_change(&mut h.changes).await;
    h.prefs.set_use_upscaler(true).unwrap();
    next_change(&mut h.changes).await;
    h.prefs.set_use_server_cache(false).unwrap();
    next_change(&mut h.changes).await;

    let settings = h.config.snapshot();
    assert!(settings.enabled);
    assert!(!settings.use_denoiser);
    assert!(!settings.use_colorizer);
    assert!(settings.use_upscaler);
    assert!(!settings.use_server_cache);
}

#[tokio::test]
async fn test_out_of_range_store_value_is_clamped() {
    let mut h = harness();

    h.store.set(KEY_DENOISER_SIGMA, PrefValue::Int(1000)).unwrap();
    next_change(&mut h.changes).await;
    assert_eq!(h.config.denoiser_sigma(), 150);

    // 夾限後仍是 150，不應再通知
    h.store.set(KEY_DENOISER_SIGMA, PrefValue::Int(500)).unwrap();
    assert_quiet(&mut h.changes).await;
}

#[tokio::test]
async fn test_wrong_type_falls_back_to_default() {
    let mut h = harness();

    h.store.set(KEY_USE_UPSCALER, PrefValue::Bool(true)).unwrap();
    next_change(&mut h.changes).await;
    assert!(h.config.use_upscaler());

    h.store.set(KEY_USE_UPSCALER, PrefValue::Text("yes".to_string())).unwrap();
    next_change(&mut h.changes).await;
    assert!(!h.config.use_upscaler());
}

#[tokio::test]
async fn test_listener_can_be_cleared() {
    let mut h = harness();
    h.config.clear_change_listener();

    h.prefs.set_enabled(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !h.config.enabled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("field was not updated");

    assert!(h.changes.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_stops_updates() {
    let mut h = harness();
    h.config.shutdown();
    tokio::task::yield_now().await;

    h.store.set(KEY_ENABLED, PrefValue::Bool(true)).unwrap();
    assert_quiet(&mut h.changes).await;
    assert!(!h.config.enabled());
}

#[tokio::test]
async fn test_scope_cancellation_stops_updates() {
    let store = Arc::new(MemoryConfigStore::new());
    let scope = CancellationToken::new();
    let config = EnhancementConfig::new(store.clone(), &scope).unwrap();

    scope.cancel();
    config.close().await;

    store.set(KEY_BASE_URL, PrefValue::Text("https://late".to_string())).unwrap();
    let fresh = EnhancementConfig::new(store, &CancellationToken::new()).unwrap();
    assert_eq!(fresh.base_url(), "https://late");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_never_see_torn_values() {
    let store = Arc::new(MemoryConfigStore::new());
    let scope = CancellationToken::new();
    let config = Arc::new(EnhancementConfig::new(store.clone(), &scope).unwrap());
    let prefs = EnhancementPreferences::new(store);

    let urls = ["https://a.example", "https://bb.example/path"];
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                for _ in 0..500 {
                    let settings = config.snapshot();
                    assert!(settings.base_url.is_empty() || urls.contains(&settings.base_url.as_str()));
                    assert!((0..=150).contains(&settings.denoiser_sigma));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for i in 0..200 {
        prefs.set_base_url(urls[i % 2]).unwrap();
        prefs.set_denoiser_sigma((i % 151) as i32).unwrap();
        tokio::task::yield_now().await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
    scope.cancel();
}

#[tokio::test]
async fn test_sigma_beyond_i32_range_is_clamped() {
    let mut h = harness();

    h.store.set(KEY_DENOISER_SIGMA, PrefValue::Int(1 << 40)).unwrap();
    next_change(&mut h.changes).await;
    assert_eq!(h.config.denoiser_sigma(), 150);
}
