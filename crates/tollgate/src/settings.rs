//! Application configuration loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::auth::AuthConfig;

pub const APP_NAME: &str = "tollgate";

/// Environment prefix; `TOLLGATE__AUTH__SIGNING_KEY` sets `auth.signing_key`.
pub const ENV_PREFIX: &str = "TOLLGATE";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file at `path` (if it
    /// exists), then environment variables under `env_prefix`.
    pub fn load(path: &Path, env_prefix: &str) -> Result<Self> {
        let built = Config::builder()
            .set_default("logging.level", "info")?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(env_prefix).separator("__"))
            .build()
            .with_context(|| format!("loading configuration from {}", path.display()))?;

        built
            .try_deserialize()
            .context("deserializing configuration")
    }
}

/// Resolve the config file path: explicit override, else the default location.
pub fn resolve_config_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => expand_path(path),
        None => Ok(default_config_dir()?.join(CONFIG_FILE_NAME)),
    }
}

/// Write a default configuration file. The signing key is never written.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push_str("#\n");
    buffer.push_str("# The signing key is required and is not stored here by default.\n");
    buffer.push_str("# Set TOLLGATE__AUTH__SIGNING_KEY, or add under [auth]:\n");
    buffer.push_str("#   signing_key = \"env:MY_SIGNING_KEY\"\n");
    buffer.push('\n');
    buffer
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.to_str() {
        Some(text) => expand_str_path(text),
        None => Ok(path.to_path_buf()),
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::tempdir;

    // Unique prefixes keep parallel tests from seeing each other's variables.

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(
            &dir.path().join("absent.toml"),
            "TOLLGATE_TEST_MISSING",
        )
        .unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 8080);
        assert!(config.auth.signing_key.is_none());
        assert_eq!(config.auth.token_ttl_secs, 86400);
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[server]
port = 9090

[auth]
signing_key = "file-key-file-key-file-key-file-key!"
token_ttl_secs = 600

[[auth.principals]]
id = "admin"
password_hash = "$2b$04$abcdefghijklmnopqrstuu"
roles = ["admin", "user"]
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path, "TOLLGATE_TEST_FILE").unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(
            config.auth.signing_key.as_ref().unwrap().expose_secret(),
            "file-key-file-key-file-key-file-key!"
        );
        assert_eq!(config.auth.principals.len(), 1);
        assert_eq!(config.auth.principals[0].roles, vec!["admin", "user"]);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[auth]\ntoken_ttl_secs = 600\n").unwrap();

        // SAFETY: the variable name is unique to this test.
        unsafe {
            env::set_var(
                "TOLLGATE_TEST_ENV__AUTH__SIGNING_KEY",
                "env-key-env-key-env-key-env-key-env-key",
            );
            env::set_var("TOLLGATE_TEST_ENV__AUTH__TOKEN_TTL_SECS", "120");
        }

        let config = AppConfig::load(&path, "TOLLGATE_TEST_ENV").unwrap();

        unsafe {
            env::remove_var("TOLLGATE_TEST_ENV__AUTH__SIGNING_KEY");
            env::remove_var("TOLLGATE_TEST_ENV__AUTH__TOKEN_TTL_SECS");
        }

        assert_eq!(config.auth.token_ttl_secs, 120);
        assert_eq!(
            config.auth.signing_key.as_ref().unwrap().expose_secret(),
            "env-key-env-key-env-key-env-key-env-key"
        );
        assert!(config.auth.validate().is_ok());
    }

    #[test]
    fn test_write_default_config_round_trips_without_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default_config(&path).unwrap();
        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Configuration for tollgate"));
        assert!(
            body.lines()
                .filter(|line| !line.starts_with('#'))
                .all(|line| !line.contains("signing_key"))
        );

        let config = AppConfig::load(&path, "TOLLGATE_TEST_DEFAULT").unwrap();
        assert!(config.auth.signing_key.is_none());
        assert_eq!(config.auth.header, "authorization");
    }

    #[test]
    fn test_resolve_config_path_override() {
        let path = resolve_config_path(Some(Path::new("/tmp/tollgate.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/tollgate.toml"));

        let default = resolve_config_path(None).unwrap();
        assert!(default.ends_with("tollgate/config.toml"));
    }
}
