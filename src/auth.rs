//! Session credentials for the web channel
//!
//! The web endpoint accepts requests signed client-side: every request
//! carries a device id, a millisecond timestamp and, per endpoint, a token
//! `PPG {device_id}:{base64(HMAC-MD5(version, "{device_id}\n{url}\n{timestamp}"))}`
//! where `version` is the release tag embedded in the provider's front-end
//! bundle. The signing has to match what the provider verifies byte for
//! byte, so it is kept exactly as the front-end computes it.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use md5::Md5;
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::endpoint::{Endpoints, Method};
use crate::error::{PapagoError, PapagoResult};

type HmacMd5 = Hmac<Md5>;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/86.0.4240.198 Whale/2.9.115.16 Safari/537.36";
pub const SEC_CH_UA: &str = r#""Chromium";v="86", "\"Not\\A;Brand";v="99", "Whale";v="2""#;

static BUNDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["/](main[\w.\-]*\.js)"#).expect("valid bundle regex"));
static VERSION_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""PPG .*?,"(v[^"]+)""#).expect("valid version regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bv\d+\.\d+\.\d+_[0-9a-f]+\b").expect("valid version regex"));

/// Authorization material for one generation of web requests.
///
/// Never patched in place: a refresh builds a new value and swaps it in whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub device_id: String,
    pub issued_at: String,
    pub provider_version: String,
    pub generation: u64,
    tokens: HashMap<Method, String>,
}

impl SessionState {
    pub fn build(
        endpoints: &Endpoints,
        device_id: &str,
        issued_at: String,
        provider_version: String,
        generation: u64,
    ) -> PapagoResult<Self> {
        let tokens = Method::ALL
            .into_iter()
            .map(|method| {
                let url = endpoints.web_url(method);
                sign(&url, &provider_version, device_id, &issued_at).map(|token| (method, token))
            })
            .collect::<PapagoResult<HashMap<_, _>>>()?;

        Ok(Self {
            device_id: device_id.to_string(),
            issued_at,
            provider_version,
            generation,
            tokens,
        })
    }

    /// Signed authorization for `method`
    pub fn token(&self, method: Method) -> &str {
        self.tokens.get(&method).map(String::as_str).unwrap_or_default()
    }

    /// Headers every web request for `method` carries
    pub fn web_headers(&self, method: Method) -> [(&'static str, String); 4] {
        [
            ("authorization", self.token(method).to_string()),
            ("timestamp", self.issued_at.clone()),
            ("user-agent", USER_AGENT.to_string()),
            ("sec-ch-ua", SEC_CH_UA.to_string()),
        ]
    }
}

/// Compute the web channel's authorization string for one endpoint URL
pub fn sign(url: &str, version: &str, device_id: &str, issued_at: &str) -> PapagoResult<String> {
    let mut mac = HmacMd5::new_from_slice(version.as_bytes())
        .map_err(|e| PapagoError::Setup(format!("cannot key signer: {}", e)))?;
    mac.update(format!("{}\n{}\n{}", device_id, url, issued_at).as_bytes());
    let digest = BASE64.encode(mac.finalize().into_bytes());
    Ok(format!("PPG {}:{}", device_id, digest))
}

/// Path of the front-end bundle referenced by the landing page
pub fn extract_bundle_path(html: &str) -> Option<String> {
    BUNDLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Release tag embedded in the front-end bundle
pub fn extract_version(script: &str) -> Option<String> {
    VERSION_MARKER_RE
        .captures(script)
        .and_then(|caps| caps.get(1))
        .or_else(|| VERSION_RE.find(script))
        .map(|m| m.as_str().to_string())
}

fn timestamp_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Owns the device identity and the current [`SessionState`]
pub struct AuthManager {
    http: reqwest::Client,
    endpoints: Endpoints,
    device_id: String,
    session: Option<Arc<SessionState>>,
    generation: u64,
}

impl AuthManager {
    /// The device id is fixed here for the manager's lifetime
    pub fn new(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            device_id: Uuid::new_v4().to_string(),
            session: None,
            generation: 0,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Number of sessions built so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current session, building the first one on demand
    pub async fn session(&mut self) -> PapagoResult<Arc<SessionState>> {
        match &self.session {
            Some(session) => Ok(Arc::clone(session)),
            None => self.refresh().await,
        }
    }

    /// Fetch the provider version and replace the session wholesale.
    ///
    /// Costs two HTTP round trips. Requests still holding the old session
    /// finish with stale tokens.
    pub async fn refresh(&mut self) -> PapagoResult<Arc<SessionState>> {
        let version = self.fetch_version().await?;
        let session = Arc::new(SessionState::build(
            &self.endpoints,
            &self.device_id,
            timestamp_millis(),
            version,
            self.generation + 1,
        )?);

        self.generation += 1;
        self.session = Some(Arc::clone(&session));
        info!(
            generation = session.generation,
            version = %session.provider_version,
            "Refreshed web session"
        );
        Ok(session)
    }

    async fn fetch_version(&self) -> PapagoResult<String> {
        let html = self.fetch_text(&self.endpoints.home_url()).await?;
        let bundle = extract_bundle_path(&html).ok_or_else(|| {
            PapagoError::Setup("front-end bundle not referenced by landing page".to_string())
        })?;
        debug!(bundle = %bundle, "Located front-end bundle");

        let script = self.fetch_text(&self.endpoints.asset_url(&bundle)).await?;
        extract_version(&script).ok_or_else(|| {
            PapagoError::Setup(format!("no provider version found in {}", bundle))
        })
    }

    async fn fetch_text(&self, url: &str) -> PapagoResult<String> {
        let response = self
            .http
            .get(url)
            .header("user-agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| PapagoError::Setup(format!("failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PapagoError::Setup(format!(
                "failed to fetch {}: HTTP {}",
                url, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PapagoError::Setup(format!("failed to read {}: {}", url, e)))
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("device_id", &self.device_id)
            .field("generation", &self.generation)
            .finish()
    }
}
