//! Initialize the configuration directory: create `~/.atende`, a default
//! config, and the media directory for catalog/promo attachments.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Ensure the configuration directory has been initialized (config file exists).
pub fn require_initialized(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `atende init` first (config file not found: {})",
            config_path.display()
        );
    }
    Ok(())
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of the config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the `media` subdirectory for catalog/promo files.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let media = config_dir.join("media");
    if !media.exists() {
        std::fs::create_dir_all(&media)
            .with_context(|| format!("creating media directory {}", media.display()))?;
        log::info!("created media directory at {}", media.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("atende-init-test-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn init_creates_config_and_media_dir() {
        let config_path = temp_config_path();
        assert!(require_initialized(&config_path).is_err());

        let dir = init_config_dir(&config_path).expect("init");
        assert!(config_path.exists());
        assert!(dir.join("media").is_dir());
        assert!(require_initialized(&config_path).is_ok());

        // Second init is a no-op, not an error.
        init_config_dir(&config_path).expect("re-init");
    }
}
