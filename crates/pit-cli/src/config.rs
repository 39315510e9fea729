//! Configuration file management for pit.
//!
//! Provides a TOML-based config file at `~/.config/pit/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pit_api::config::ApiConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: ApiSection,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the pit config directory: `$XDG_CONFIG_HOME/pit` or
/// `~/.config/pit`, on every platform.
pub fn config_dir() -> PathBuf {
    config_dir_from(std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from))
}

fn config_dir_from(xdg: Option<PathBuf>) -> PathBuf {
    if let Some(xdg) = xdg {
        return xdg.join("pit");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pit")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Write the config file, creating parent dirs as needed. The file holds
/// tokens, so it is made owner-only on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PitConfig {
    pub api: ApiConfig,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

impl PitConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - API URL: `cli_api_url` > `PIT_API_URL` > `api.url` > `ApiConfig::DEFAULT_URL`
    /// - Token: `PIT_TOKEN` > `auth.token`
    /// - Refresh token: `PIT_REFRESH_TOKEN` > `auth.refresh_token`
    pub fn resolve(cli_api_url: Option<&str>) -> Self {
        let file = load_config_from(&config_path()).ok();
        Self::resolve_with(cli_api_url, |key| std::env::var(key).ok(), file)
    }

    fn resolve_with(
        cli_api_url: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
        file: Option<ConfigFile>,
    ) -> Self {
        let file = file.unwrap_or_default();

        let api_url = cli_api_url
            .map(str::to_owned)
            .or_else(|| env("PIT_API_URL"))
            .or_else(|| Some(file.api.url).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| ApiConfig::DEFAULT_URL.to_owned());

        // Keep the env-provided timeout, if any.
        let api = ApiConfig::new(api_url).with_timeout(ApiConfig::from_env().timeout);

        Self {
            api,
            token: env("PIT_TOKEN").or(file.auth.token),
            refresh_token: env("PIT_REFRESH_TOKEN").or(file.auth.refresh_token),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file(url: &str, token: Option<&str>) -> ConfigFile {
        ConfigFile {
            api: ApiSection {
                url: url.to_owned(),
            },
            auth: AuthSection {
                token: token.map(str::to_owned),
                refresh_token: None,
            },
        }
    }

    #[test]
    fn cli_flag_overrides_all() {
        let config = PitConfig::resolve_with(
            Some("https://cli.example/api/"),
            env_of(&[("PIT_API_URL", "https://env.example/api")]),
            Some(file("https://file.example/api", None)),
        );
        assert_eq!(config.api.api_url, "https://cli.example/api");
    }

    #[test]
    fn env_var_overrides_config_file() {
        let config = PitConfig::resolve_with(
            None,
            env_of(&[("PIT_API_URL", "https://env.example/api"), ("PIT_TOKEN", "env-token")]),
            Some(file("https://file.example/api", Some("file-token"))),
        );
        assert_eq!(config.api.api_url, "https://env.example/api");
        assert_eq!(config.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn config_file_used_when_env_unset() {
        let config = PitConfig::resolve_with(
            None,
            env_of(&[]),
            Some(file("https://file.example/api", Some("file-token"))),
        );
        assert_eq!(config.api.api_url, "https://file.example/api");
        assert_eq!(config.token.as_deref(), Some("file-token"));
        assert_eq!(config.refresh_token, None);
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = PitConfig::resolve_with(None, env_of(&[]), None);
        assert_eq!(config.api.api_url, ApiConfig::DEFAULT_URL);
        assert_eq!(config.token, None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("pit").join("config.toml");

        let mut original = file("https://school.example/api", Some("abc"));
        original.auth.refresh_token = Some("r".to_owned());
        save_config_to(&path, &original).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.api.url, original.api.url);
        assert_eq!(loaded.auth.token.as_deref(), Some("abc"));
        assert_eq!(loaded.auth.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn auth_section_is_optional() {
        let loaded: ConfigFile = toml::from_str("[api]\nurl = \"http://x/api\"\n").unwrap();
        assert_eq!(loaded.auth.token, None);
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&path, &file("http://x/api", Some("secret"))).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn xdg_dir_takes_precedence() {
        let dir = config_dir_from(Some(PathBuf::from("/tmp/xdg")));
        assert_eq!(dir, PathBuf::from("/tmp/xdg/pit"));
        assert!(config_dir_from(None).ends_with(".config/pit"));
    }
}
