use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use node_rpc::compression::DEFAULT_MAX_MESSAGE_BYTES;
use node_rpc::{CallOptions, Compression};
use snafu::{Location, ResultExt, Snafu, ensure};
use tokio::sync::Semaphore;

pub mod settings;

pub use settings::{Setting, Settings};

pub const AUTH_TOKEN: &str = "server.auth_token";
pub const AUTH_REQUIRED: &str = "server.auth_required";
pub const MAX_CONCURRENT_CALLS: &str = "server.max_concurrent_calls";
pub const RATE_LIMIT_FAIL_FAST: &str = "server.rate_limit_fail_fast";
pub const LOG_CALLS: &str = "server.log_calls";
pub const MAX_FRAMES_PER_REQUEST: &str = "server.max_frames_per_request";
pub const IDEMPOTENCY_CACHE_SIZE: &str = "server.idempotency_cache_size";
pub const MAX_REQUEST_BYTES: &str = "server.max_request_bytes";
pub const CLIENT_DEFAULT_TIMEOUT_MS: &str = "client.default_timeout_ms";
pub const CLIENT_COMPRESSION: &str = "client.compression";
pub const CLIENT_AUTH_TOKEN: &str = "client.auth_token";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Missing required parameter: {parameter}"))]
    MissingParameter {
        parameter: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid value for parameter {parameter}: {explanation}"))]
    InvalidParameterValue {
        parameter: String,
        value: String,
        explanation: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to read config file {}", path.display()))]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to parse config file {}", path.display()))]
    FileParse {
        path: PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Server side knobs: interceptors and handler limits.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Bearer token required by the auth interceptor. `None` disables auth.
    pub auth_token: Option<String>,
    pub max_concurrent_calls: usize,
    pub rate_limit_fail_fast: bool,
    pub log_calls: bool,
    pub max_frames_per_request: usize,
    pub idempotency_cache_size: usize,
    /// Cap on a request payload after decompression.
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            auth_token: None,
            max_concurrent_calls: 64,
            rate_limit_fail_fast: false,
            log_calls: true,
            max_frames_per_request: 128,
            idempotency_cache_size: 1024,
            max_request_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &dyn Settings) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();
        let max_concurrent_calls =
            get_count(settings, MAX_CONCURRENT_CALLS)?.unwrap_or(defaults.max_concurrent_calls);
        ensure!(
            max_concurrent_calls > 0,
            InvalidParameterValueSnafu {
                parameter: MAX_CONCURRENT_CALLS,
                value: "0",
                explanation: "at least one call must be allowed",
            }
        );
        ensure!(
            max_concurrent_calls <= Semaphore::MAX_PERMITS,
            InvalidParameterValueSnafu {
                parameter: MAX_CONCURRENT_CALLS,
                value: max_concurrent_calls.to_string(),
                explanation: format!("at most {} calls can be allowed", Semaphore::MAX_PERMITS),
            }
        );
        let max_frames_per_request = get_count(settings, MAX_FRAMES_PER_REQUEST)?
            .unwrap_or(defaults.max_frames_per_request);
        ensure!(
            max_frames_per_request > 0,
            InvalidParameterValueSnafu {
                parameter: MAX_FRAMES_PER_REQUEST,
                value: "0",
                explanation: "must be positive",
            }
        );

        let max_request_bytes =
            get_count(settings, MAX_REQUEST_BYTES)?.unwrap_or(defaults.max_request_bytes);
        ensure!(
            max_request_bytes > 0,
            InvalidParameterValueSnafu {
                parameter: MAX_REQUEST_BYTES,
                value: "0",
                explanation: "must be positive",
            }
        );

        let auth_token = settings.get_string(AUTH_TOKEN).filter(|t| !t.is_empty());
        if get_flag(settings, AUTH_REQUIRED)?.unwrap_or(false) {
            ensure!(
                auth_token.is_some(),
                MissingParameterSnafu {
                    parameter: AUTH_TOKEN
                }
            );
        }

        Ok(ServerConfig {
            auth_token,
            max_concurrent_calls,
            rate_limit_fail_fast: get_flag(settings, RATE_LIMIT_FAIL_FAST)?
                .unwrap_or(defaults.rate_limit_fail_fast),
            log_calls: get_flag(settings, LOG_CALLS)?.unwrap_or(defaults.log_calls),
            max_frames_per_request,
            idempotency_cache_size: get_count(settings, IDEMPOTENCY_CACHE_SIZE)?
                .unwrap_or(defaults.idempotency_cache_size),
            max_request_bytes,
        })
    }
}

/// Defaults applied to every call made through the node's clients.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientConfig {
    pub default_timeout: Option<Duration>,
    pub compression: Compression,
    pub auth_token: Option<String>,
}

impl ClientConfig {
    pub fn from_settings(settings: &dyn Settings) -> Result<Self, ConfigError> {
        let default_timeout = get_count(settings, CLIENT_DEFAULT_TIMEOUT_MS)?
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms as u64));
        let compression = match settings.get_string(CLIENT_COMPRESSION) {
            Some(name) => name.parse::<Compression>().map_err(|e| {
                InvalidParameterValueSnafu {
                    parameter: CLIENT_COMPRESSION,
                    value: name.clone(),
                    explanation: format!("{e}"),
                }
                .build()
            })?,
            None => Compression::default(),
        };
        Ok(ClientConfig {
            default_timeout,
            compression,
            auth_token: settings
                .get_string(CLIENT_AUTH_TOKEN)
                .filter(|t| !t.is_empty()),
        })
    }

    pub fn call_options(&self) -> CallOptions {
        let mut options = CallOptions::new().compression(self.compression);
        if let Some(timeout) = self.default_timeout {
            options = options.timeout(timeout);
        }
        if let Some(token) = &self.auth_token {
            options = options.credentials(token.clone());
        }
        options
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl NodeConfig {
    pub fn from_settings(settings: &dyn Settings) -> Result<Self, ConfigError> {
        Ok(NodeConfig {
            server: ServerConfig::from_settings(settings)?,
            client: ClientConfig::from_settings(settings)?,
        })
    }

    /// Loads a JSON object. Nested objects become dotted keys, so
    /// `{"server": {"log_calls": false}}` sets `server.log_calls`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = load_json_settings(path)?;
        tracing::debug!(path = %path.display(), keys = settings.len(), "Loaded config file");
        Self::from_settings(&settings)
    }
}

pub fn load_json_settings(path: &Path) -> Result<HashMap<String, Setting>, ConfigError> {
    let content = std::fs::read_to_string(path).context(FileReadSnafu { path })?;
    let value: serde_json::Value =
        serde_json::from_str(&content).context(FileParseSnafu { path })?;
    let mut settings = HashMap::new();
    flatten_json("", &value, &mut settings)?;
    Ok(settings)
}

fn flatten_json(
    prefix: &str,
    value: &serde_json::Value,
    settings: &mut HashMap<String, Setting>,
) -> Result<(), ConfigError> {
    use serde_json::Value;

    let setting = match value {
        Value::Object(entries) => {
            for (key, value) in entries {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_json(&key, value, settings)?;
            }
            return Ok(());
        }
        Value::String(s) => Setting::String(s.clone()),
        Value::Bool(b) => Setting::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Setting::Int(i),
            None => Setting::Double(n.as_f64().unwrap_or_default()),
        },
        Value::Null => return Ok(()),
        Value::Array(_) => {
            return InvalidParameterValueSnafu {
                parameter: prefix,
                value: value.to_string(),
                explanation: "arrays are not supported",
            }
            .fail();
        }
    };
    ensure!(
        !prefix.is_empty(),
        InvalidParameterValueSnafu {
            parameter: "<root>",
            value: value.to_string(),
            explanation: "config must be a JSON object",
        }
    );
    settings.set(prefix, setting);
    Ok(())
}

/// Non-negative integer setting.
fn get_count(settings: &dyn Settings, key: &str) -> Result<Option<usize>, ConfigError> {
    let Some(setting) = settings.get(key) else {
        return Ok(None);
    };
    match setting {
        Setting::Int(value) if value >= 0 => Ok(Some(value as usize)),
        other => InvalidParameterValueSnafu {
            parameter: key,
            value: format!("{other:?}"),
            explanation: "expected a non-negative integer",
        }
        .fail(),
    }
}

/// Boolean setting given as a bool, 0/1 or "true"/"false".
fn get_flag(settings: &dyn Settings, key: &str) -> Result<Option<bool>, ConfigError> {
    let Some(setting) = settings.get(key) else {
        return Ok(None);
    };
    match &setting {
        Setting::Bool(value) => Ok(Some(*value)),
        Setting::Int(0) => Ok(Some(false)),
        Setting::Int(1) => Ok(Some(true)),
        Setting::String(s) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Setting::String(s) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
        other => InvalidParameterValueSnafu {
            parameter: key,
            value: format!("{other:?}"),
            explanation: format!("expected a boolean, got {}", other.kind()),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_settings() {
        let settings: HashMap<String, Setting> = HashMap::new();
        let config = NodeConfig::from_settings(&settings).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(config.server.log_calls);
        assert_eq!(config.client.compression, Compression::Identity);
    }

    #[test]
    fn test_server_config_from_settings() {
        let mut settings = HashMap::new();
        settings.set_string(AUTH_TOKEN, "s3cret".to_string());
        settings.set_int(MAX_CONCURRENT_CALLS, 4);
        settings.set_string(RATE_LIMIT_FAIL_FAST, "true".to_string());
        settings.set_int(LOG_CALLS, 0);
        let config = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.max_concurrent_calls, 4);
        assert!(config.rate_limit_fail_fast);
        assert!(!config.log_calls);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut settings = HashMap::new();
        settings.set_int(MAX_CONCURRENT_CALLS, 0);
        assert!(matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::InvalidParameterValue { ref parameter, .. }) if parameter == MAX_CONCURRENT_CALLS
        ));
    }

    #[test]
    fn test_concurrency_above_semaphore_capacity_is_rejected() {
        let mut settings = HashMap::new();
        settings.set_int(MAX_CONCURRENT_CALLS, 3_000_000_000_000_000_000);
        assert!(matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::InvalidParameterValue { ref parameter, ref value, .. })
                if parameter == MAX_CONCURRENT_CALLS && value == "3000000000000000000"
        ));

        settings.set_int(MAX_CONCURRENT_CALLS, Semaphore::MAX_PERMITS as i64);
        let config = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.max_concurrent_calls, Semaphore::MAX_PERMITS);
    }

    #[test]
    fn test_request_size_cap_from_settings() {
        let mut settings = HashMap::new();
        settings.set_int(MAX_REQUEST_BYTES, 2048);
        let config = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.max_request_bytes, 2048);

        settings.set_int(MAX_REQUEST_BYTES, 0);
        assert!(matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::InvalidParameterValue { ref parameter, .. }) if parameter == MAX_REQUEST_BYTES
        ));
    }

    #[test]
    fn test_required_auth_needs_token() {
        let mut settings = HashMap::new();
        settings.set_int(AUTH_REQUIRED, 1);
        assert!(matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::MissingParameter { ref parameter, .. }) if parameter == AUTH_TOKEN
        ));
        settings.set_string(AUTH_TOKEN, "s3cret".to_string());
        assert!(ServerConfig::from_settings(&settings).is_ok());
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut settings = HashMap::new();
        settings.set_string(MAX_FRAMES_PER_REQUEST, "many".to_string());
        assert!(matches!(
            ServerConfig::from_settings(&settings),
            Err(ConfigError::InvalidParameterValue { .. })
        ));
    }

    #[test]
    fn test_client_config_and_call_options() {
        let mut settings = HashMap::new();
        settings.set_int(CLIENT_DEFAULT_TIMEOUT_MS, 1500);
        settings.set_string(CLIENT_COMPRESSION, "gzip".to_string());
        settings.set_string(CLIENT_AUTH_TOKEN, "s3cret".to_string());
        let config = ClientConfig::from_settings(&settings).unwrap();
        let options = config.call_options();
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.compression, Some(Compression::Gzip));
        assert_eq!(options.credentials.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_unknown_compression_is_rejected() {
        let mut settings = HashMap::new();
        settings.set_string(CLIENT_COMPRESSION, "zstd".to_string());
        assert!(matches!(
            ClientConfig::from_settings(&settings),
            Err(ConfigError::InvalidParameterValue { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server": {{ "auth_token": "s3cret", "max_concurrent_calls": 2, "log_calls": false }},
                "client": {{ "compression": "gzip", "default_timeout_ms": 250 }}
            }}"#
        )
        .unwrap();
        let config = NodeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.server.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.server.max_concurrent_calls, 2);
        assert!(!config.server.log_calls);
        assert_eq!(config.client.compression, Compression::Gzip);
        assert_eq!(
            config.client.default_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_from_json_file_errors() {
        let missing = std::env::temp_dir().join("node-config-does-not-exist.json");
        assert!(matches!(
            NodeConfig::from_json_file(&missing),
            Err(ConfigError::FileRead { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            NodeConfig::from_json_file(file.path()),
            Err(ConfigError::FileParse { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(matches!(
            NodeConfig::from_json_file(file.path()),
            Err(ConfigError::InvalidParameterValue { .. })
        ));
    }
}
