//! Configuration loading and management
//!
//! [`Settings`] is built once at startup from defaults, an optional YAML file
//! and the environment (in increasing precedence), then handed to the
//! application context.

use crate::auth::{HashCost, PasswordHasher};
use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use validator::Validate;

/// Environment variable naming the YAML settings file
pub const CONFIG_PATH_VAR: &str = "STENCIL_CONFIG";

/// Signing key used outside production when none is configured
pub const DEV_SECRET_KEY: &str = "stencil-development-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
    Testing,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDialect {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for DatabaseDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(DatabaseDialect::Memory),
            "postgres" | "postgresql" => Ok(DatabaseDialect::Postgres),
            other => Err(format!("unsupported dialect '{}'", other)),
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseSettings {
    pub dialect: DatabaseDialect,
    pub user: String,
    pub password: String,
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub name: String,
    /// Full URL; overrides the individual parts
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dialect: DatabaseDialect::Memory,
            user: "root".into(),
            password: "123456".into(),
            host: "localhost".into(),
            port: 5432,
            name: "stencil".into(),
            url: None,
            max_connections: 10,
        }
    }
}

impl DatabaseSettings {
    /// Connection URL, with the password form-encoded
    pub fn url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let password: String = url::form_urlencoded::byte_serialize(self.password.as_bytes()).collect();
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Only `simple` (in process) is built in
    pub cache_type: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_type: "simple".into(),
        }
    }
}

/// Token lifetimes, signing key and password hash cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthSettings {
    pub secret_key: Option<String>,
    /// Access token lifetime in seconds
    #[validate(range(min = 1))]
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    #[validate(range(min = 1))]
    pub refresh_token_ttl: u64,
    pub hash_memory_kib: u32,
    #[validate(range(min = 1))]
    pub hash_iterations: u32,
    #[validate(range(min = 1))]
    pub hash_parallelism: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        let cost = HashCost::default();
        Self {
            secret_key: None,
            access_token_ttl: 900,
            refresh_token_ttl: 2_592_000,
            hash_memory_kib: cost.memory_kib,
            hash_iterations: cost.iterations,
            hash_parallelism: cost.parallelism,
        }
    }
}

impl AuthSettings {
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
            parallelism: self.hash_parallelism,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LogSettings {
    pub dir: PathBuf,
    #[validate(length(min = 1))]
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        Self {
            dir: home.join("logs").join("stencil"),
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// Request timeout in seconds
    #[validate(range(min = 1))]
    pub request_timeout: u64,
    pub enable_cors: bool,
    /// Allowed origins; empty means any
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            request_timeout: 30,
            enable_cors: false,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    #[validate(nested)]
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    #[validate(nested)]
    pub auth: AuthSettings,
    #[validate(nested)]
    pub log: LogSettings,
    #[validate(nested)]
    pub server: ServerSettings,
    pub scheduler: SchedulerSettings,
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        field: key.to_string(),
        value: raw.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.to_string(),
            message: "expected a boolean".into(),
        }),
    }
}

fn read_yaml(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::from(e),
    })
}

/// Attach the file name to a parse error
fn in_file(err: ConfigError, path: &Path) -> ConfigError {
    match err {
        ConfigError::ParseError { message, .. } => ConfigError::ParseError {
            file: Some(path.display().to_string()),
            message,
        },
        other => other,
    }
}

/// The `environment` key of a YAML document, if any
fn yaml_environment(yaml: &str) -> Result<Environment, ConfigError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    match doc.get("environment") {
        Some(value) => Ok(serde_yaml::from_value(value.clone())?),
        None => Ok(Environment::default()),
    }
}

/// Recursively lay `overlay` over `base`; mappings merge, everything else replaces
fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl Settings {
    /// Defaults suited to `environment`
    pub fn for_environment(environment: Environment) -> Self {
        let mut settings = Self {
            environment,
            ..Self::default()
        };
        if environment == Environment::Testing {
            settings.scheduler.enabled = false;
            settings.auth.hash_memory_kib = 1024;
            settings.auth.hash_iterations = 1;
        }
        settings
    }

    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = read_yaml(path)?;
        Self::from_yaml_str(&yaml).map_err(|e| in_file(e, path))
    }

    /// Load settings from a YAML string; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Overlay a YAML document on these settings; missing keys keep their
    /// current values
    pub fn merge_yaml_str(self, yaml: &str) -> Result<Self, ConfigError> {
        let overlay: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if overlay.is_null() {
            return Ok(self);
        }
        let mut merged = serde_yaml::to_value(&self)?;
        merge_yaml(&mut merged, overlay);
        Ok(serde_yaml::from_value(merged)?)
    }

    /// Apply environment overrides read through `lookup`
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var("APP_ENV") {
            self.environment = parse("APP_ENV", &v)?;
        }
        if let Some(v) = var("SECRET_KEY") {
            self.auth.secret_key = Some(v);
        }

        let db = &mut self.database;
        if let Some(v) = var("DATABASE_DIALECT") {
            db.dialect = parse("DATABASE_DIALECT", &v)?;
        }
        if let Some(v) = var("DATABASE_USER") {
            db.user = v;
        }
        if let Some(v) = var("DATABASE_PASSWORD") {
            db.password = v;
        }
        if let Some(v) = var("DATABASE_HOST") {
            db.host = v;
        }
        if let Some(v) = var("DATABASE_PORT") {
            db.port = parse("DATABASE_PORT", &v)?;
        }
        if let Some(v) = var("DATABASE_DB") {
            db.name = v;
        }
        if let Some(v) = var("DATABASE_URL") {
            db.url = Some(v);
        }
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            db.max_connections = parse("DATABASE_MAX_CONNECTIONS", &v)?;
        }

        if let Some(v) = var("CACHE_TYPE") {
            self.cache.cache_type = v;
        }

        let auth = &mut self.auth;
        if let Some(v) = var("JWT_ACCESS_TOKEN_EXPIRES") {
            auth.access_token_ttl = parse("JWT_ACCESS_TOKEN_EXPIRES", &v)?;
        }
        if let Some(v) = var("JWT_REFRESH_TOKEN_EXPIRES") {
            auth.refresh_token_ttl = parse("JWT_REFRESH_TOKEN_EXPIRES", &v)?;
        }
        if let Some(v) = var("PASSWORD_HASH_MEMORY_KIB") {
            auth.hash_memory_kib = parse("PASSWORD_HASH_MEMORY_KIB", &v)?;
        }
        if let Some(v) = var("PASSWORD_HASH_ITERATIONS") {
            auth.hash_iterations = parse("PASSWORD_HASH_ITERATIONS", &v)?;
        }
        if let Some(v) = var("PASSWORD_HASH_PARALLELISM") {
            auth.hash_parallelism = parse("PASSWORD_HASH_PARALLELISM", &v)?;
        }

        if let Some(v) = var("LOG_DIR") {
            self.log.dir = PathBuf::from(v);
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = var("LOG_JSON") {
            self.log.json = parse_bool("LOG_JSON", &v)?;
        }

        let server = &mut self.server;
        if let Some(v) = var("BIND_HOST") {
            server.host = v;
        }
        if let Some(v) = var("BIND_PORT") {
            server.port = parse("BIND_PORT", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT") {
            server.request_timeout = parse("REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = var("ENABLE_CORS") {
            server.enable_cors = parse_bool("ENABLE_CORS", &v)?;
        }
        if let Some(v) = var("CORS_ORIGINS") {
            server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = var("SCHEDULER_ENABLED") {
            self.scheduler.enabled = parse_bool("SCHEDULER_ENABLED", &v)?;
        }

        Ok(self)
    }

    /// Settings of this process, read from the real environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Resolve settings from variables read through `lookup`
    ///
    /// `APP_ENV` (or else the YAML file's `environment`) picks the profile.
    /// The `STENCIL_CONFIG` file is laid over that profile and the remaining
    /// variables over the result. The outcome is validated.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(CONFIG_PATH_VAR).filter(|p| !p.is_empty()).map(PathBuf::from);
        let yaml = path.as_deref().map(read_yaml).transpose()?;

        let environment = match lookup("APP_ENV").filter(|v| !v.is_empty()) {
            Some(v) => parse("APP_ENV", &v)?,
            None => match (&yaml, &path) {
                (Some(yaml), Some(path)) => yaml_environment(yaml).map_err(|e| in_file(e, path))?,
                _ => Environment::default(),
            },
        };

        let mut settings = Self::for_environment(environment);
        if let (Some(yaml), Some(path)) = (&yaml, &path) {
            settings = settings.merge_yaml_str(yaml).map_err(|e| in_file(e, path))?;
            settings.environment = environment;
        }
        let settings = settings.with_env(lookup)?;
        settings.ensure_valid()?;
        Ok(settings)
    }

    /// Key used to sign tokens
    ///
    /// Production has no fallback: a missing key is an error there.
    pub fn secret_key(&self) -> Result<&str, ConfigError> {
        match self.auth.secret_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            Some(_) => Err(ConfigError::InvalidValue {
                field: "SECRET_KEY".into(),
                value: String::new(),
                message: "must not be empty".into(),
            }),
            None if self.environment != Environment::Production => Ok(DEV_SECRET_KEY),
            None => Err(ConfigError::MissingField {
                field: "SECRET_KEY".into(),
                context: "production settings".into(),
            }),
        }
    }

    /// Check field ranges and cross-field rules
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| ConfigError::InvalidValue {
            field: "settings".into(),
            value: String::new(),
            message: e.to_string(),
        })?;

        if self.cache.cache_type != "simple" {
            return Err(ConfigError::InvalidValue {
                field: "CACHE_TYPE".into(),
                value: self.cache.cache_type.clone(),
                message: "only the 'simple' cache backend is available".into(),
            });
        }

        self.secret_key()?;

        PasswordHasher::new(self.auth.hash_cost()).map_err(|e| ConfigError::InvalidValue {
            field: "PASSWORD_HASH_*".into(),
            value: format!("{:?}", self.auth.hash_cost()),
            message: e.to_string(),
        })?;

        Ok(())
    }
}
