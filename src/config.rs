use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "NEWSDECK";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigestConfig {
    /// Path or URL of the digest feed. Empty means start with the
    /// built-in placeholder cards.
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    "newsdeck/0.1 (+https://github.com/newsdeck/newsdeck)".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

/// The view restored at startup, as a fragment string. A shared link's
/// hash pasted here reproduces that view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewConfig {
    #[serde(default)]
    pub fragment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_capture_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            workers: default_workers(),
            timeout: default_capture_timeout(),
        }
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("newsdeck"))
}

fn default_workers() -> usize {
    2
}

fn default_capture_timeout() -> Duration {
    Duration::from_secs(3)
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.digest.source.is_empty() {
        base.digest.source = other.digest.source;
    }
    if !other.digest.user_agent.is_empty() {
        base.digest.user_agent = other.digest.user_agent;
    }

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }

    if !other.view.fragment.is_empty() {
        base.view.fragment = other.view.fragment;
    }

    if other.capture.cache_dir.is_some() {
        base.capture.cache_dir = other.capture.cache_dir;
    }
    if other.capture.workers != 0 {
        base.capture.workers = other.capture.workers;
    }
    if !other.capture.timeout.is_zero() {
        base.capture.timeout = other.capture.timeout;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    // Everything unset in the environment stays at its sentinel so the
    // merge leaves file values alone.
    let mut cfg = empty_config();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn empty_config() -> Config {
    Config {
        digest: DigestConfig {
            source: String::new(),
            user_agent: String::new(),
        },
        ui: UIConfig {
            theme: String::new(),
        },
        view: ViewConfig {
            fragment: String::new(),
        },
        capture: CaptureConfig {
            cache_dir: None,
            workers: 0,
            timeout: Duration::ZERO,
        },
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "digest.source" => cfg.digest.source = value,
        "digest.user_agent" => cfg.digest.user_agent = value,
        "ui.theme" => cfg.ui.theme = value,
        "view.fragment" => cfg.view.fragment = value,
        "capture.cache_dir" => cfg.capture.cache_dir = Some(PathBuf::from(value)),
        "capture.workers" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.capture.workers = parsed;
            }
        }
        "capture.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.capture.timeout = duration;
            }
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("newsdeck").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            env_prefix: Some("NEWSDECK_TEST_NONE".into()),
            ..LoadOptions::default()
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.capture.timeout, Duration::from_secs(3));
        assert!(cfg.digest.source.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "digest:\n  source: /tmp/digest.json\nview:\n  fragment: \"sort=score&order=desc\"\ncapture:\n  timeout: 5s\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("NEWSDECK_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.digest.source, "/tmp/digest.json");
        assert_eq!(cfg.view.fragment, "sort=score&order=desc");
        assert_eq!(cfg.capture.timeout, Duration::from_secs(5));
    }

    #[test]
    fn env_overrides() {
        env::set_var("NEWSDECK_ENVTEST_UI__THEME", "dracula");
        let cfg = load(LoadOptions {
            env_prefix: Some("NEWSDECK_ENVTEST".into()),
            ..LoadOptions::default()
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "dracula");
        env::remove_var("NEWSDECK_ENVTEST_UI__THEME");
    }
}
