use anyhow::Context;
use clap::Parser;
use page_enhance::config::cli::{Command, ConfigAction, EnhanceArgs};
use page_enhance::config::{EnhancementPreferences, ALL_KEYS, KEY_BASE_URL};
use page_enhance::utils::{logger, validation::Validate};
use page_enhance::{
    CliConfig, ConfigStore, EnhancementClient, EnhancementConfig, FileConfigStore,
    MemoryConfigStore, PageEnhancer, PageImage, PageMetadata, PrefValue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI config: {:?}", cli);

    let store = Arc::new(
        FileConfigStore::open(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?,
    );

    match &cli.command {
        Command::Config { action } => run_config(store, action),
        Command::Enhance(args) => {
            if let Err(e) = args.validate() {
                tracing::error!("❌ Invalid arguments: {}", e);
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }

            let enhanced = run_enhance(store, args).await?;
            if !enhanced {
                // 原圖已寫出，用結束碼告知呼叫端沒有增強
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

fn run_config(store: Arc<FileConfigStore>, action: &ConfigAction) -> anyhow::Result<()> {
    let prefs = EnhancementPreferences::new(store.clone());

    match action {
        ConfigAction::Show => {
            let settings = prefs.settings();
            println!("# {}", store.path().display());
            println!("{} = {}", ALL_KEYS[0], settings.enabled);
            println!("{} = {:?}", ALL_KEYS[1], settings.base_url);
            println!("{} = {}", ALL_KEYS[2], settings.use_denoiser);
            println!("{} = {}", ALL_KEYS[3], settings.use_colorizer);
            println!("{} = {}", ALL_KEYS[4], settings.use_upscaler);
            println!("{} = {}", ALL_KEYS[5], settings.denoiser_sigma);
            println!("{} = {}", ALL_KEYS[6], settings.use_server_cache);
            println!(
                "transport.accept_invalid_certs = {}",
                store.transport().accept_invalid_certs
            );
            if let Some(timeout) = store.transport().timeout_seconds {
                println!("transport.timeout_seconds = {}", timeout);
            }
        }
        ConfigAction::Set { key, value } => {
            prefs
                .set_raw(key, value)
                .with_context(|| format!("failed to set {}", key))?;
            println!("✅ {} = {}", key, value);
        }
    }

    Ok(())
}

async fn run_enhance(store: Arc<FileConfigStore>, args: &EnhanceArgs) -> anyhow::Result<bool> {
    let mut policy = store.transport().to_policy();
    policy.accept_invalid_certs |= args.accept_invalid_certs;
    if let Some(timeout) = args.timeout_secs {
        policy.timeout = Some(Duration::from_secs(timeout));
    }

    // --base-url 只影響這次執行，不寫回設定檔
    let store: Arc<dyn ConfigStore> = match &args.base_url {
        Some(base_url) => {
            let overlay = MemoryConfigStore::with_values(store.snapshot().preferences);
            overlay.set(KEY_BASE_URL, PrefValue::Text(base_url.clone()))?;
            Arc::new(overlay) as Arc<dyn ConfigStore>
        }
        None => store as Arc<dyn ConfigStore>,
    };

    let scope = CancellationToken::new();
    let config = Arc::new(EnhancementConfig::new(store, &scope)?);
    let client = Arc::new(EnhancementClient::new(policy)?);
    let enhancer = PageEnhancer::with_scope(client, Arc::clone(&config), scope.clone());

    let image_bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let metadata = PageMetadata {
        image_name: args.name.clone().or_else(|| {
            args.input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        }),
        image_url: args.url.clone(),
        source_id: args.source.clone(),
        title: args.title.clone(),
        chapter_label: args.chapter.clone(),
    };

    if !config.enabled() {
        tracing::warn!(
            "⚠️ Enhancement is disabled, run `page-enhance config set pref_enhancement_enabled true`"
        );
    }

    tracing::info!(
        "Enhancing {} ({} bytes)",
        args.input.display(),
        image_bytes.len()
    );

    let task = enhancer.spawn(PageImage::new(metadata, image_bytes.clone()));
    let result = tokio::select! {
        result = task.join() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling enhancement");
            enhancer.shutdown();
            None
        }
    };

    match result {
        Some(enhanced) => {
            tokio::fs::write(&args.output, &enhanced.image_data).await?;
            tracing::info!("✅ Enhanced image saved to: {}", args.output.display());
            println!("✅ Enhanced image saved to: {}", args.output.display());
            Ok(true)
        }
        None => {
            tokio::fs::write(&args.output, &image_bytes).await?;
            tracing::info!("Original image kept at: {}", args.output.display());
            println!("ℹ️ Enhancement unavailable, original saved to: {}", args.output.display());
            Ok(false)
        }
    }
}
