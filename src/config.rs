//! Configuration loading and management.
//!
//! Loads `pdh` configuration from a TOML file: `--config`, `$PDH_CONFIG`, or
//! `~/.config/pdh.toml`, in that order.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::output::{RenderTarget, DEFAULT_EVEN_STYLE, DEFAULT_ODD_STYLE};
use crate::pagerduty::http::DEFAULT_MAX_ATTEMPTS;
use crate::pagerduty::DEFAULT_API_URL;

/// Default per-stage rule timeout in seconds.
pub const DEFAULT_RULE_TIMEOUT_SECS: u64 = 300;

/// Default directory holding rule executables.
pub const DEFAULT_RULES_PATH: &str = "~/.config/pdh_rules";

/// Errors produced while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The home directory could not be determined.
    #[error("cannot determine home directory")]
    NoHomeDir,
    /// The file exists but could not be read.
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
    /// The configuration could not be encoded.
    #[error("failed to encode config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The file could not be written.
    #[error("failed to write config at {}: {source}", .path.display())]
    Write {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A required key is empty.
    #[error("missing required setting '{0}', run `pdh config` first")]
    Missing(&'static str),
    /// Interactive input failed.
    #[error("failed to read input: {0}")]
    Prompt(#[from] dialoguer::Error),
}

// ── Top-level config ────────────────────────────────────────────

/// Top-level `pdh` configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdhConfig {
    /// PagerDuty REST API key.
    pub apikey: String,
    /// PagerDuty id of the user running the tool.
    pub uid: String,
    /// Email sent in the `From` header of write requests.
    pub email: String,
    /// API endpoint.
    pub api_url: String,
    /// Rule execution settings.
    pub rules: RulesConfig,
    /// Rendering settings.
    pub output: OutputConfig,
    /// HTTP client settings.
    pub http: HttpConfig,
}

impl Default for PdhConfig {
    fn default() -> Self {
        Self {
            apikey: String::new(),
            uid: String::new(),
            email: String::new(),
            api_url: DEFAULT_API_URL.to_owned(),
            rules: RulesConfig::default(),
            output: OutputConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl std::fmt::Debug for PdhConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdhConfig")
            .field("apikey", &"[REDACTED]")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("api_url", &self.api_url)
            .field("rules", &self.rules)
            .field("output", &self.output)
            .field("http", &self.http)
            .finish()
    }
}

impl PdhConfig {
    /// Load configuration from `path` with env overrides applied.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`PdhConfig::load`] with a custom env resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[doc(hidden)]
    pub fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolve the config file path: explicit flag, then `$PDH_CONFIG`, then
    /// `~/.config/pdh.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] when the default is needed and the
    /// home directory is unknown.
    pub fn resolve_path(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, ConfigError> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }
        if let Some(p) = env("PDH_CONFIG") {
            return Ok(expand_home(&p));
        }
        default_config_path()
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    #[doc(hidden)]
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PDH_API_KEY") {
            self.apikey = v;
        }
        if let Some(v) = env("PDH_UID") {
            self.uid = v;
        }
        if let Some(v) = env("PDH_EMAIL") {
            self.email = v;
        }
        if let Some(v) = env("PDH_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = env("PDH_RULES_PATH") {
            self.rules.path = v;
        }
        if let Some(v) = env("PDH_RULE_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.rules.timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = "PDH_RULE_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Check that the credentials needed for API calls are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first empty key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("apikey", &self.apikey), ("uid", &self.uid), ("email", &self.email)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }
        Ok(())
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on encoding or filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(write_error)?;
        tracing::info!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Directory searched for rules, with `~` expanded.
    pub fn rules_dir(&self) -> PathBuf {
        expand_home(&self.rules.path)
    }

    /// Per-stage rule timeout; `None` when disabled with `0`.
    pub fn rule_timeout(&self) -> Option<Duration> {
        match self.rules.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Ask for credentials interactively, offering current values as defaults.
    ///
    /// An empty API key answer keeps the current key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Prompt`] if the terminal cannot be read.
    pub fn prompt(&self) -> Result<Self, ConfigError> {
        use dialoguer::{theme::ColorfulTheme, Input, Password};

        let theme = ColorfulTheme::default();
        let apikey = Password::with_theme(&theme)
            .with_prompt("PagerDuty API key (empty keeps current)")
            .allow_empty_password(true)
            .interact()?;
        let email: String = Input::with_theme(&theme)
            .with_prompt("Email")
            .with_initial_text(self.email.clone())
            .interact_text()?;
        let uid: String = Input::with_theme(&theme)
            .with_prompt("PagerDuty user id")
            .with_initial_text(self.uid.clone())
            .interact_text()?;

        let mut updated = self.clone();
        if !apikey.trim().is_empty() {
            updated.apikey = apikey.trim().to_owned();
        }
        updated.email = email.trim().to_owned();
        updated.uid = uid.trim().to_owned();
        Ok(updated)
    }
}

// ── Sections ────────────────────────────────────────────────────

/// Rule execution settings (`[rules]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory of rule executables; `~` is expanded.
    pub path: String,
    /// Per-stage timeout in seconds, `0` disables it.
    pub timeout_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_RULES_PATH.to_owned(),
            timeout_secs: DEFAULT_RULE_TIMEOUT_SECS,
        }
    }
}

/// Rendering settings (`[output]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format.
    pub format: RenderTarget,
    /// Style of odd-indexed table rows.
    pub odd_color: String,
    /// Style of even-indexed table rows.
    pub even_color: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: RenderTarget::Table,
            odd_color: DEFAULT_ODD_STYLE.to_owned(),
            even_color: DEFAULT_EVEN_STYLE.to_owned(),
        }
    }
}

/// HTTP client settings (`[http]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Attempts per request on transport failures.
    pub max_attempts: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────

/// `~/.config/pdh.toml`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if the home directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = directories::BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.home_dir().join(".config").join("pdh.toml"))
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match directories::BaseDirs::new() {
        Some(home) if rest.is_empty() => home.home_dir().to_path_buf(),
        Some(home) => home.home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

// ── Tests ───────────────────────────────────────────────────────
