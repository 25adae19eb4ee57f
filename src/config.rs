//! Client configuration
//!
//! Loaded from a JSON file or from the environment (a `.env` file is picked
//! up when present). Every field has a default, so an empty object is a valid
//! configuration: web channel only, provider endpoints, five web attempts.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::dispatcher::Backoff;
use crate::endpoint::Endpoints;
use crate::error::{PapagoError, PapagoResult};

/// One REST API client id / secret pair
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ApiCredential {
    pub client_id: String,
    pub client_secret: String,
}

impl ApiCredential {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Tried in this order; empty means web channel only
    pub credentials: Vec<ApiCredential>,
    /// Web channel attempts per request
    pub retry: u32,
    pub request_timeout_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    /// Proxy URL applied to every request
    pub proxy: Option<String>,
    pub endpoints: Endpoints,
    /// Account the OCR service URL is derived from
    pub ocr_account: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            retry: 5,
            request_timeout_ms: 3000,
            backoff_min_ms: 1100,
            backoff_max_ms: 4321,
            proxy: None,
            endpoints: Endpoints::default(),
            ocr_account: None,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str) -> PapagoResult<Option<T>> {
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| PapagoError::Config(format!("{} is not a valid number: {}", name, raw)))
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).collect()
}

impl ClientConfig {
    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> PapagoResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PapagoError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ClientConfig = serde_json::from_str(&raw).map_err(|e| {
            PapagoError::Config(format!("invalid configuration in {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build from `PAPAGO_*` environment variables.
    ///
    /// `PAPAGO_CLIENT_IDS` and `PAPAGO_CLIENT_SECRETS` are comma-separated and
    /// paired by position.
    pub fn from_env() -> PapagoResult<Self> {
        let _ = dotenvy::dotenv();
        let mut config = ClientConfig::default();

        match (env_var("PAPAGO_CLIENT_IDS"), env_var("PAPAGO_CLIENT_SECRETS")) {
            (Some(ids), Some(secrets)) => {
                let ids = split_list(&ids);
                let secrets = split_list(&secrets);
                if ids.len() != secrets.len() {
                    return Err(PapagoError::Config(format!(
                        "{} client ids but {} client secrets",
                        ids.len(),
                        secrets.len()
                    )));
                }
                config.credentials = ids
                    .into_iter()
                    .zip(secrets)
                    .map(|(id, secret)| ApiCredential::new(id, secret))
                    .collect();
            }
            (None, None) => {}
            _ => {
                return Err(PapagoError::Config(
                    "PAPAGO_CLIENT_IDS and PAPAGO_CLIENT_SECRETS must be set together".to_string(),
                ));
            }
        }

        if let Some(retry) = env_number("PAPAGO_RETRY")? {
            config.retry = retry;
        }
        if let Some(timeout) = env_number("PAPAGO_TIMEOUT_MS")? {
            config.request_timeout_ms = timeout;
        }
        config.proxy = env_var("PAPAGO_PROXY");
        config.ocr_account = env_var("PAPAGO_OCR_ACCOUNT");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PapagoResult<()> {
        for (i, credential) in self.credentials.iter().enumerate() {
            if credential.client_id.trim().is_empty() || credential.client_secret.trim().is_empty() {
                return Err(PapagoError::Config(format!(
                    "credential #{} has an empty client id or secret",
                    i
                )));
            }
        }
        if self.retry == 0 {
            return Err(PapagoError::Config("retry must be at least 1".to_string()));
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(PapagoError::Config(format!(
                "backoff window is inverted: {}ms > {}ms",
                self.backoff_min_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            min: Duration::from_millis(self.backoff_min_ms),
            max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.credentials.is_empty());
        assert_eq!(config.retry, 5);
        assert_eq!(config.backoff().min, Duration::from_millis(1100));
        assert_eq!(config.backoff().max, Duration::from_millis(4321));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_keeps_credential_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "credentials": [
                    {{"client_id": "second", "client_secret": "s2"}},
                    {{"client_id": "first", "client_secret": "s1"}}
                ],
                "retry": 2,
                "endpoints": {{"web_base": "http://localhost:1234"}}
            }}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        let ids: Vec<_> = config.credentials.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert_eq!(config.retry, 2);
        assert_eq!(config.endpoints.web_base, "http://localhost:1234");
        assert_eq!(config.endpoints.api_base, "https://openapi.naver.com");
        assert_eq!(config.request_timeout_ms, 3000);
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let config = ClientConfig {
            credentials: vec![ApiCredential::new("id", " ")],
            ..Default::default()
        };
        match config.validate() {
            Err(PapagoError::Config(msg)) => assert!(msg.contains("credential #0")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_retry_and_inverted_backoff_are_rejected() {
        let config = ClientConfig {
            retry: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            backoff_min_ms: 10,
            backoff_max_ms: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"credentials": {{"id": "secret"}}}}"#).unwrap();
        assert!(matches!(
            ClientConfig::from_file(file.path()),
            Err(PapagoError::Config(_))
        ));
    }

    #[test]
    fn test_debug_masks_secret() {
        let debug = format!("{:?}", ApiCredential::new("my-id", "my-secret"));
        assert!(debug.contains("my-id"));
        assert!(!debug.contains("my-secret"));
    }
}
