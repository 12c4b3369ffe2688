//! Layered settings: defaults, then `Rollout.toml`, then `ROLLOUT_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use rollout_deploy::{SETTINGS_FILENAME, Settings};

/// Environment variables overriding the settings file, `__` separates nested keys.
const ENV_PREFIX: &str = "ROLLOUT_";

/// The settings file for `path`, which may also be a directory.
pub fn settings_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(SETTINGS_FILENAME)
    } else {
        path.to_path_buf()
    }
}

pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file(settings_path(path)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let file = settings_path(path);
    if !file.exists() {
        tracing::debug!(path = %file.display(), "No settings file, using defaults");
    }

    figment(path)
        .extract()
        .with_context(|| format!("Failed to load settings from {}", file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_file_and_environment_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILENAME,
                r#"
                max_retries = 3
                artifacts_dir = "build/artifacts"

                [rpc_urls]
                bsc-fork = "http://localhost:9545"
                "#,
            )?;
            jail.set_env("ROLLOUT_RETRY_DELAY_MS", "250");
            jail.set_env("ROLLOUT_RPC__POLL_INTERVAL_MS", "500");

            let settings: Settings = figment(Path::new(SETTINGS_FILENAME)).extract()?;
            assert_eq!(settings.max_retries, 3);
            assert_eq!(settings.retry_delay_ms, 250);
            assert_eq!(settings.rpc.poll_interval_ms, 500);
            assert_eq!(settings.artifacts_dir, PathBuf::from("build/artifacts"));
            assert_eq!(settings.rpc_urls["bsc-fork"], "http://localhost:9545");
            assert!(settings.estimate_gas);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_| {
            let settings: Settings = figment(Path::new("missing.toml")).extract()?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }
}
