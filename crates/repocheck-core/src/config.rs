//! Engine configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all, via [`EngineConfig::load_or_default`]) is valid.
//!
//! ```toml
//! workspace_root = "/var/tmp/repocheck"
//!
//! [lint]
//! config_dir = "config/lint"
//! eslint_max_major = 9
//!
//! [git]
//! checkout_retries = 1
//!
//! [notify]
//! webhook_url = "https://hooks.example.com/repocheck"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for `git.checkout_retries`.
pub const MAX_CHECKOUT_RETRIES: u32 = 5;

pub const RUBOCOP_CONFIG_FILE: &str = ".rubocop.yml";
pub const ESLINT_CONFIG_FILE: &str = ".eslintrc.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid checkout_retries: {0}. Must be at most {MAX_CHECKOUT_RETRIES}")]
    InvalidCheckoutRetries(u32),

    #[error("Invalid eslint_max_major: {0}. Must be at least 1")]
    InvalidEslintMajor(u32),

    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be an http(s) URL, got {value}")]
    InvalidUrl { field: &'static str, value: String },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parent directory for per-check workspaces.
    pub workspace_root: PathBuf,
    pub lint: LintConfig,
    pub git: GitConfig,
    pub notify: NotifyConfig,
    pub github: GithubConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            lint: LintConfig::default(),
            git: GitConfig::default(),
            notify: NotifyConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Directory holding `.rubocop.yml` and `.eslintrc.json`.
    pub config_dir: PathBuf,
    /// Project-local ESLint binary, relative to the working directory.
    pub eslint_local_bin: PathBuf,
    /// Local ESLint is used only when its major version is below this.
    pub eslint_max_major: u32,
    /// Package spec handed to `npx` when the local binary is unusable.
    pub eslint_fallback_package: String,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config/lint"),
            eslint_local_bin: PathBuf::from("node_modules/.bin/eslint"),
            eslint_max_major: 9,
            eslint_fallback_package: "eslint@8.57.0".to_string(),
        }
    }
}

impl LintConfig {
    pub fn rubocop_config(&self) -> PathBuf {
        self.config_dir.join(RUBOCOP_CONFIG_FILE)
    }

    pub fn eslint_config(&self) -> PathBuf {
        self.config_dir.join(ESLINT_CONFIG_FILE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Host used to build `<host>/<full_name>.git` when a repository has no
    /// explicit URL.
    pub host_url: String,
    /// Checkout attempts made after fetching a missing commit.
    pub checkout_retries: u32,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            host_url: "https://github.com".to_string(),
            checkout_retries: 1,
        }
    }
}

impl GitConfig {
    pub fn host(&self) -> &str {
        self.host_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// POST failure reports here when set.
    pub webhook_url: Option<String>,
    /// Base URL for linking to a check; the check id is appended.
    pub check_url_base: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git.checkout_retries > MAX_CHECKOUT_RETRIES {
            return Err(ConfigError::InvalidCheckoutRetries(
                self.git.checkout_retries,
            ));
        }
        if self.lint.eslint_max_major == 0 {
            return Err(ConfigError::InvalidEslintMajor(self.lint.eslint_max_major));
        }
        if self.lint.eslint_fallback_package.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "lint.eslint_fallback_package",
            });
        }
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "workspace_root",
            });
        }

        check_http_url("git.host_url", &self.git.host_url)?;
        check_http_url("github.api_url", &self.github.api_url)?;
        if let Some(url) = &self.notify.webhook_url {
            check_http_url("notify.webhook_url", url)?;
        }
        Ok(())
    }
}

fn check_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        })
    }
}
