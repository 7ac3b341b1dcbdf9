use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::capture;
use crate::config;
use crate::digest::{
    ClientConfig, DigestService, FileDigestService, HttpDigestService, MockDigestService,
};
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Path or URL overriding the configured digest source.
    pub digest_source: Option<String>,
    /// Fragment string overriding the configured startup view.
    pub view_fragment: Option<String>,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    init_logging(cfg.capture.cache_dir.clone());

    let source = opts
        .digest_source
        .unwrap_or_else(|| cfg.digest.source.clone());
    let service = build_digest_service(&source, &cfg)?;

    let (items, status) = match service.load() {
        Ok(digest) => {
            let count = digest.items.len();
            let status = if source.is_empty() {
                "No digest configured. Pass --digest <path|url> or set digest.source.".to_string()
            } else {
                format!("Loaded {count} cards. j/k to move, 1-4 to sort, f to filter, q to quit.")
            };
            (digest.items, status)
        }
        Err(err) => {
            tracing::warn!(error = %err, %source, "digest load failed");
            let items = MockDigestService.load()?.items;
            (items, format!("Could not load digest: {err:#}"))
        }
    };

    let capture_manager = capture::Manager::new(capture::Config {
        cache_dir: cfg.capture.cache_dir.clone(),
        workers: cfg.capture.workers,
        timeout: cfg.capture.timeout,
        http_client: None,
    })
    .ok();
    let capture_handle = capture_manager.as_ref().map(|manager| manager.handle());

    let initial_fragment = opts
        .view_fragment
        .unwrap_or_else(|| cfg.view.fragment.clone());

    let options = ui::Options {
        status_message: status,
        items,
        initial_fragment,
        capture: capture_handle,
        theme: cfg.ui.theme.clone(),
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    drop(capture_manager);
    Ok(())
}

fn build_digest_service(source: &str, cfg: &config::Config) -> Result<Box<dyn DigestService>> {
    if source.is_empty() {
        return Ok(Box::new(MockDigestService));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        let service = HttpDigestService::new(
            source,
            ClientConfig {
                user_agent: cfg.digest.user_agent.clone(),
                http_client: None,
            },
        )
        .context("build digest client")?;
        return Ok(Box::new(service));
    }
    Ok(Box::new(FileDigestService::new(source)))
}

/// Log to a file under the cache dir; writing to stderr would tear up the
/// alternate screen.
fn init_logging(cache_dir: Option<PathBuf>) {
    let Some(dir) = cache_dir.or_else(|| dirs::cache_dir().map(|d| d.join("newsdeck"))) else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = fs::File::create(dir.join("newsdeck.log")) else {
        return;
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
