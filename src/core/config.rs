use std::env;

use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid BACKEND_CORS_ORIGINS value: {0}")]
    InvalidCors(String),
    #[error("SECRET_KEY must be set when running in production")]
    MissingSecretKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub(crate) fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    security: SecuritySettings,
    database: DatabaseSettings,
    cors: CorsSettings,
    attempt: AttemptSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
struct ServerSettings {
    host: String,
    port: u16,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) algorithm: String,
    pub(crate) access_token_expire_minutes: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    url: Option<String>,
    host: String,
    port: u16,
    user: String,
    password: String,
    name: String,
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

/// Knobs for the attempt-session lifecycle. The countdown tick is fixed at
/// one second and is not configurable.
#[derive(Debug, Clone)]
pub(crate) struct AttemptSettings {
    pub(crate) default_duration_minutes: u64,
    pub(crate) autosave_interval_seconds: u64,
    pub(crate) sweep_interval_seconds: u64,
    pub(crate) failed_session_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("PREPLINE_HOST", "0.0.0.0");
        let port = parse_u16("PREPLINE_PORT", env_or_default("PREPLINE_PORT", "8000"))?;

        let environment =
            parse_environment(env_optional("PREPLINE_ENV").or_else(|| env_optional("ENVIRONMENT")));

        let secret_key = env_or_default("SECRET_KEY", "insecure-dev-secret");
        if environment.is_production() && secret_key == "insecure-dev-secret" {
            return Err(ConfigError::MissingSecretKey);
        }
        let algorithm = env_or_default("ALGORITHM", "HS256");
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;

        let database_url = env_optional("DATABASE_URL");
        let postgres_host = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "prepline");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "prepline_db");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let default_duration_minutes = parse_u64(
            "DEFAULT_TEST_DURATION_MINUTES",
            env_or_default("DEFAULT_TEST_DURATION_MINUTES", "30"),
        )?;
        let autosave_interval_seconds = parse_u64(
            "AUTO_SAVE_INTERVAL_SECONDS",
            env_or_default("AUTO_SAVE_INTERVAL_SECONDS", "15"),
        )?;
        let sweep_interval_seconds = parse_u64(
            "SESSION_SWEEP_INTERVAL_SECONDS",
            env_or_default("SESSION_SWEEP_INTERVAL_SECONDS", "300"),
        )?;
        let failed_session_ttl_seconds = parse_u64(
            "FAILED_SESSION_TTL_SECONDS",
            env_or_default("FAILED_SESSION_TTL_SECONDS", "3600"),
        )?;

        let log_level = env_or_default("LOG_LEVEL", "info");
        let log_json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Settings {
            server: ServerSettings { host, port },
            runtime: RuntimeSettings { environment },
            security: SecuritySettings { secret_key, algorithm, access_token_expire_minutes },
            database: DatabaseSettings {
                url: database_url,
                host: postgres_host,
                port: postgres_port,
                user: postgres_user,
                password: postgres_password,
                name: postgres_db,
            },
            cors: CorsSettings { origins: cors_origins },
            attempt: AttemptSettings {
                default_duration_minutes: default_duration_minutes.max(1),
                autosave_interval_seconds: autosave_interval_seconds.max(1),
                sweep_interval_seconds: sweep_interval_seconds.max(1),
                failed_session_ttl_seconds: failed_session_ttl_seconds.max(1),
            },
            telemetry: TelemetrySettings { log_level, json: log_json },
        })
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn attempt(&self) -> &AttemptSettings {
        &self.attempt
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref() {
        Some("production") | Some("prod") => Environment::Production,
        Some("test") => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim().is_empty() {
        return Ok(default_cors_origins());
    }

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(default_cors_origins());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(default_cors_origins());
    }

    Ok(items)
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|origin| origin.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_truthy_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn parse_environment_defaults_to_development() {
        assert_eq!(parse_environment(None), Environment::Development);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Development);
        assert_eq!(parse_environment(Some("production".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("test".to_string())), Environment::Test);
    }

    #[test]
    fn parse_cors_origins_accepts_json_and_csv() {
        let json = parse_cors_origins(Some(r#"["https://a.example","https://b.example"]"#.into()))
            .expect("json origins");
        assert_eq!(json, vec!["https://a.example", "https://b.example"]);

        let csv = parse_cors_origins(Some("https://a.example, https://b.example".into()))
            .expect("csv origins");
        assert_eq!(csv, vec!["https://a.example", "https://b.example"]);

        let fallback = parse_cors_origins(Some("  ".into())).expect("fallback origins");
        assert_eq!(fallback, default_cors_origins());
    }

    #[test]
    fn parse_u16_rejects_garbage() {
        assert!(parse_u16("PREPLINE_PORT", "not-a-port".to_string()).is_err());
        assert_eq!(parse_u16("PREPLINE_PORT", "8000".to_string()).expect("port"), 8000);
    }
}
