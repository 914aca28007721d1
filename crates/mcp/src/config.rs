//! Company configuration loading.
//!
//! The configuration file holds one TOML table per company:
//!
//! ```toml
//! [acme]
//! ODOO_URL = "https://acme.odoo.com"
//! ODOO_DATABASE = "acme-prod"
//! ODOO_API_KEY = "..."
//! COMPANY_ID = 1
//! ODOO_REQUEST_TIMEOUT = 30
//! ODOO_MAX_RETRIES = 3
//! ```
//!
//! Keys are matched case-insensitively. A key missing from a table falls back
//! to the process environment variable of the same name, then to the built-in
//! default where one exists.

use crate::company::CompanyRegistry;
use odoo_client::{CompanyProfile, OdooError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable that overrides the configuration file path.
pub const CONFIG_FILE_ENV: &str = "ODOO_CONFIG_FILE";

/// Configuration file used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "odoo-mcp.toml";

pub const KEY_URL: &str = "ODOO_URL";
pub const KEY_DATABASE: &str = "ODOO_DATABASE";
pub const KEY_API_KEY: &str = "ODOO_API_KEY";
pub const KEY_COMPANY_ID: &str = "COMPANY_ID";
pub const KEY_TIMEOUT: &str = "ODOO_REQUEST_TIMEOUT";
pub const KEY_MAX_RETRIES: &str = "ODOO_MAX_RETRIES";

const ALL_KEYS: [&str; 6] = [
    KEY_URL,
    KEY_DATABASE,
    KEY_API_KEY,
    KEY_COMPANY_ID,
    KEY_TIMEOUT,
    KEY_MAX_RETRIES,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: `{0}`")]
    MissingFile(PathBuf),
    #[error("could not read configuration file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse configuration file `{path}`: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("company '{company}': missing required key {key}")]
    MissingKey { company: String, key: &'static str },
    #[error("company '{company}': invalid value for {key}: `{value}`")]
    InvalidValue {
        company: String,
        key: &'static str,
        value: String,
    },
    #[error(transparent)]
    Profile(#[from] OdooError),
}

/// Global defaults taken from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvDefaults {
    values: HashMap<&'static str, String>,
}

impl EnvDefaults {
    /// Capture the configuration variables from the process environment.
    pub fn from_process() -> Self {
        let values = ALL_KEYS
            .iter()
            .filter_map(|&key| std::env::var(key).ok().map(|value| (key, value)))
            .collect();
        Self { values }
    }

    /// Build defaults from explicit pairs. Unknown keys are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                ALL_KEYS
                    .iter()
                    .find(|known| known.eq_ignore_ascii_case(key))
                    .map(|&known| (known, value.to_string()))
            })
            .collect();
        Self { values }
    }

    fn get(&self, key: &'static str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Resolve the configuration file path: explicit path, then `ODOO_CONFIG_FILE`,
/// then [`DEFAULT_CONFIG_FILE`].
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Loads company profiles into a [`CompanyRegistry`].
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env: EnvDefaults,
}

impl ConfigLoader {
    pub fn new(env: EnvDefaults) -> Self {
        Self { env }
    }

    /// Load the registry from a file.
    ///
    /// A missing or unparsable file yields an empty registry; the problem is
    /// logged and every later lookup reports the company as not found.
    pub fn load(&self, path: &Path) -> CompanyRegistry {
        match self.try_load(path) {
            Ok(registry) => registry,
            Err(e) => {
                warn!("{}", e);
                warn!("No companies loaded; every tool call will report an unknown company");
                CompanyRegistry::new()
            }
        }
    }

    /// Load the registry from a file, reporting file-level problems.
    pub fn try_load(&self, path: &Path) -> Result<CompanyRegistry, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let registry = self
            .parse(&content)
            .map_err(|source| ConfigError::ParseFile {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            path = %path.display(),
            "Loaded {} company configurations: {}",
            registry.len(),
            registry.names().join(", ")
        );
        Ok(registry)
    }

    /// Parse configuration text. Invalid company tables are skipped with a
    /// warning; only a TOML syntax error fails the whole document.
    pub fn parse(&self, content: &str) -> Result<CompanyRegistry, toml::de::Error> {
        let document: toml::Table = toml::from_str(content)?;
        let mut registry = CompanyRegistry::new();

        for (name, value) in &document {
            let Some(section) = value.as_table() else {
                warn!(key = %name, "Ignoring top-level key outside a company table");
                continue;
            };

            match self.profile_from_section(name, section) {
                Ok(profile) => {
                    if let Err(e) = registry.register(profile) {
                        warn!(company = %name, "Skipping company configuration: {}", e);
                    }
                }
                Err(e) => warn!(company = %name, "Skipping company configuration: {}", e),
            }
        }

        for profile in registry.profiles() {
            info!(
                company = %profile.name,
                url = %profile.base_url,
                database = %profile.database,
                company_id = profile.company_id,
                api_key = %profile.api_key_hint(),
                timeout_secs = profile.timeout.as_secs_f64(),
                max_retries = profile.retry_config.max_retries,
                "Registered company"
            );
        }

        Ok(registry)
    }

    fn profile_from_section(
        &self,
        company: &str,
        section: &toml::Table,
    ) -> Result<CompanyProfile, ConfigError> {
        let lookup = Lookup {
            company,
            section,
            env: &self.env,
        };

        let url = lookup.required_string(KEY_URL)?;
        let database = lookup.required_string(KEY_DATABASE)?;
        let api_key = lookup.required_string(KEY_API_KEY)?;

        let mut profile = CompanyProfile::new(company, &url, database, api_key)?;

        if let Some(company_id) = lookup.integer(KEY_COMPANY_ID)? {
            profile = profile.with_company_id(company_id);
        }
        if let Some(timeout) = lookup.timeout()? {
            profile = profile.with_timeout(timeout);
        }
        if let Some(max_retries) = lookup.integer(KEY_MAX_RETRIES)? {
            let max_retries =
                u32::try_from(max_retries).map_err(|_| lookup.invalid(KEY_MAX_RETRIES, max_retries))?;
            profile = profile.with_max_retries(max_retries);
        }

        Ok(profile)
    }
}

/// Raw value of one key, from the section or the environment.
enum Raw<'a> {
    Toml(&'a toml::Value),
    Env(&'a str),
}

struct Lookup<'a> {
    company: &'a str,
    section: &'a toml::Table,
    env: &'a EnvDefaults,
}

impl<'a> Lookup<'a> {
    fn raw(&self, key: &'static str) -> Option<Raw<'a>> {
        self.section
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| Raw::Toml(v))
            .or_else(|| self.env.get(key).map(Raw::Env))
    }

    fn invalid(&self, key: &'static str, value: impl ToString) -> ConfigError {
        ConfigError::InvalidValue {
            company: self.company.to_string(),
            key,
            value: value.to_string(),
        }
    }

    fn parse_text<T: std::str::FromStr>(&self, key: &'static str, text: &str) -> Result<T, ConfigError> {
        text.trim().parse().map_err(|_| self.invalid(key, text))
    }

    fn required_string(&self, key: &'static str) -> Result<String, ConfigError> {
        let value = match self.raw(key) {
            None => None,
            Some(Raw::Env(s)) => Some(s.trim().to_string()),
            Some(Raw::Toml(toml::Value::String(s))) => Some(s.trim().to_string()),
            Some(Raw::Toml(toml::Value::Integer(i))) => Some(i.to_string()),
            Some(Raw::Toml(other)) => return Err(self.invalid(key, other)),
        };

        value
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                company: self.company.to_string(),
                key,
            })
    }

    fn integer(&self, key: &'static str) -> Result<Option<i64>, ConfigError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Raw::Toml(toml::Value::Integer(i))) => Ok(Some(*i)),
            Some(Raw::Toml(toml::Value::String(s))) => self.parse_text(key, s).map(Some),
            Some(Raw::Env(s)) => self.parse_text(key, s).map(Some),
            Some(Raw::Toml(other)) => Err(self.invalid(key, other)),
        }
    }

    fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        let seconds = match self.raw(KEY_TIMEOUT) {
            None => return Ok(None),
            Some(Raw::Toml(toml::Value::Integer(i))) => *i as f64,
            Some(Raw::Toml(toml::Value::Float(f))) => *f,
            Some(Raw::Toml(toml::Value::String(s))) => self.parse_text(KEY_TIMEOUT, s)?,
            Some(Raw::Env(s)) => self.parse_text(KEY_TIMEOUT, s)?,
            Some(Raw::Toml(other)) => return Err(self.invalid(KEY_TIMEOUT, other)),
        };

        match Duration::try_from_secs_f64(seconds) {
            Ok(timeout) if !timeout.is_zero() => Ok(Some(timeout)),
            _ => Err(self.invalid(KEY_TIMEOUT, seconds)),
        }
    }
}
