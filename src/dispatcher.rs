//! Dual-channel request dispatch
//!
//! A request goes to the REST API first when the operation is eligible and
//! credentials are configured, trying every credential once in order. If
//! none succeeds it goes to the web endpoint, which is retried with a
//! jittered pause between attempts and a fresh session after every
//! rejection. Only web rejections trigger re-authentication; REST failures
//! never touch the session.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{AuthManager, SessionState};
use crate::capability::is_api_eligible;
use crate::config::ApiCredential;
use crate::endpoint::{Endpoints, Method, OperationRequest};
use crate::error::{PapagoError, PapagoResult};

/// Which transport produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Api,
    Web,
}

/// A successful (HTTP 200) provider answer
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub channel: Channel,
    pub body: serde_json::Value,
}

/// Random pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1100),
            max: Duration::from_millis(4321),
        }
    }
}

impl Backoff {
    pub fn jitter(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

enum Attempt {
    Success(serde_json::Value),
    /// Timed out, could not connect, or the connection broke
    Transient(String),
    /// Any non-200 answer
    Rejected { status: u16, body: String },
}

/// Short single-line rendering of user text for log lines
pub(crate) fn preview(text: &str) -> String {
    const LIMIT: usize = 40;
    let mut out: String = text.chars().take(LIMIT).collect();
    if text.chars().count() > LIMIT {
        out.push('…');
    }
    out.replace('\n', "\\n")
}

async fn race<F: Future>(cancel: &CancellationToken, fut: F) -> PapagoResult<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => Err(PapagoError::Cancelled),
        output = fut => Ok(output),
    }
}

/// A request that could not be built is our own bug; every other transport
/// error moves on to the next credential or attempt.
fn classify(e: reqwest::Error) -> PapagoResult<Attempt> {
    if e.is_builder() {
        return Err(e.into());
    }
    Ok(Attempt::Transient(e.to_string()))
}

async fn execute(method: Method, request: reqwest::RequestBuilder) -> PapagoResult<Attempt> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return classify(e),
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return classify(e),
    };

    if status != StatusCode::OK {
        return Ok(Attempt::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body)
        .map(Attempt::Success)
        .map_err(|e| PapagoError::UnexpectedResponse {
            method,
            detail: format!("invalid JSON ({}): {}", e, body),
        })
}

fn api_form(text: &str, request: &OperationRequest) -> Vec<(&'static str, String)> {
    match request {
        OperationRequest::Detect => vec![("query", text.to_string())],
        OperationRequest::TranslateNeural(p) | OperationRequest::TranslateStatistical(p) => vec![
            ("source", p.source.code().to_string()),
            ("target", p.target.code().to_string()),
            ("text", text.to_string()),
        ],
        OperationRequest::SynthesizeSpeech(_) => Vec::new(),
    }
}

fn web_form(
    text: &str,
    request: &OperationRequest,
    session: &SessionState,
) -> Vec<(&'static str, String)> {
    match request {
        OperationRequest::Detect => vec![("query", text.to_string())],
        OperationRequest::TranslateNeural(p) | OperationRequest::TranslateStatistical(p) => vec![
            ("deviceId", session.device_id.clone()),
            ("locale", p.target.code().to_string()),
            ("honorific", p.honorific.to_string()),
            ("dict", "false".to_string()),
            ("instant", "false".to_string()),
            ("paging", "false".to_string()),
            ("source", p.source.code().to_string()),
            ("target", p.target.code().to_string()),
            ("text", text.to_string()),
            ("authorization", session.token(request.method()).to_string()),
            ("timestamp", session.issued_at.clone()),
        ],
        OperationRequest::SynthesizeSpeech(s) => vec![
            ("alpha", s.alpha.to_string()),
            ("pitch", s.pitch.to_string()),
            ("speed", s.speed.to_string()),
            ("speaker", s.speaker.to_string()),
            ("text", text.to_string()),
        ],
    }
}

/// Whether the REST channel may serve this request
pub fn api_eligible(request: &OperationRequest) -> bool {
    match request {
        OperationRequest::Detect => true,
        OperationRequest::TranslateNeural(p) => is_api_eligible(p.source, p.target),
        OperationRequest::TranslateStatistical(_) | OperationRequest::SynthesizeSpeech(_) => false,
    }
}

pub struct Dispatcher {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: Vec<ApiCredential>,
    auth: AuthManager,
    retry: u32,
    backoff: Backoff,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        credentials: Vec<ApiCredential>,
        retry: u32,
        backoff: Backoff,
    ) -> Self {
        let auth = AuthManager::new(http.clone(), endpoints.clone());
        Self {
            http,
            endpoints,
            credentials,
            auth,
            retry,
            backoff,
            cancel: CancellationToken::new(),
        }
    }

    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Await `fut` unless the client is cancelled first
    pub async fn cancellable<F: Future>(&self, fut: F) -> PapagoResult<F::Output> {
        race(&self.cancel, fut).await
    }

    /// Build a fresh session now instead of on first web use
    pub async fn reauthenticate(&mut self) -> PapagoResult<()> {
        race(&self.cancel, self.auth.refresh()).await??;
        Ok(())
    }

    async fn pause(&self) -> PapagoResult<()> {
        race(&self.cancel, tokio::time::sleep(self.backoff.jitter())).await
    }

    /// Send one chunk of text for one operation.
    ///
    /// Fails with [`PapagoError::RequestExhausted`] once both channels are used
    /// up; the error carries the last status and body seen.
    pub async fn send(
        &mut self,
        text: &str,
        request: &OperationRequest,
    ) -> PapagoResult<ProviderResponse> {
        if self.cancel.is_cancelled() {
            return Err(PapagoError::Cancelled);
        }

        let method = request.method();
        let mut last_status = None;
        let mut last_body = String::new();

        if let Some(url) = self.endpoints.api_url(method).filter(|_| api_eligible(request)) {
            let form = api_form(text, request);
            for credential in &self.credentials {
                let builder = self
                    .http
                    .post(&url)
                    .header("X-Naver-Client-Id", &credential.client_id)
                    .header("X-Naver-Client-Secret", &credential.client_secret)
                    .form(&form);

                match race(&self.cancel, execute(method, builder)).await?? {
                    Attempt::Success(body) => {
                        debug!(%method, client_id = %credential.client_id, "API request succeeded for '{}'", preview(text));
                        return Ok(ProviderResponse {
                            channel: Channel::Api,
                            body,
                        });
                    }
                    Attempt::Transient(reason) => {
                        warn!(%method, client_id = %credential.client_id, "API request failed: {}", reason);
                        self.pause().await?;
                    }
                    Attempt::Rejected { status, body } => {
                        warn!(%method, client_id = %credential.client_id, status, "API request rejected: {}", body);
                        last_status = Some(status);
                        last_body = body;
                    }
                }
            }
            if !self.credentials.is_empty() {
                info!(%method, "API channel exhausted for '{}', using web channel", preview(text));
            }
        }

        let url = self.endpoints.web_url(method);
        for attempt in 1..=self.retry {
            let session = race(&self.cancel, self.auth.session()).await??;
            let mut builder = self.http.post(&url).form(&web_form(text, request, &session));
            for (name, value) in session.web_headers(method) {
                builder = builder.header(name, value);
            }

            match race(&self.cancel, execute(method, builder)).await?? {
                Attempt::Success(body) => {
                    debug!(%method, attempt, "Web request succeeded for '{}'", preview(text));
                    return Ok(ProviderResponse {
                        channel: Channel::Web,
                        body,
                    });
                }
                Attempt::Transient(reason) => {
                    warn!(%method, attempt, "Web request failed: {}", reason);
                    last_status = None;
                    last_body = reason;
                    if attempt < self.retry {
                        self.pause().await?;
                    }
                }
                Attempt::Rejected { status, body } => {
                    warn!(%method, attempt, status, "Web request rejected: {}", body);
                    last_status = Some(status);
                    last_body = body;
                    if attempt < self.retry {
                        self.pause().await?;
                        race(&self.cancel, self.auth.refresh()).await??;
                    }
                }
            }
        }

        Err(PapagoError::RequestExhausted {
            method,
            status: last_status,
            body: last_body,
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoints", &self.endpoints)
            .field("credentials", &self.credentials.len())
            .field("retry", &self.retry)
            .field("backoff", &self.backoff)
            .field("auth", &self.auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Language;
    use crate::endpoint::{SpeechPayload, TranslatePayload};

    fn payload(source: Language, target: Language) -> TranslatePayload {
        TranslatePayload {
            source,
            target,
            honorific: true,
        }
    }

    fn session() -> SessionState {
        SessionState::build(
            &Endpoints::default(),
            "device-1",
            "1700000000000".to_string(),
            "v1.7.3_5f1f1fc6ed".to_string(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_backoff_stays_in_window() {
        let backoff = Backoff {
            min: Duration::from_millis(10),
            max: Duration::from_millis(20),
        };
        for _ in 0..100 {
            let pause = backoff.jitter();
            assert!(pause >= backoff.min && pause <= backoff.max);
        }
    }

    #[test]
    fn test_backoff_degenerate_window() {
        let backoff = Backoff {
            min: Duration::from_millis(5),
            max: Duration::from_millis(1),
        };
        assert_eq!(backoff.jitter(), Duration::from_millis(5));
    }

    #[test]
    fn test_api_eligibility() {
        assert!(api_eligible(&OperationRequest::Detect));
        assert!(api_eligible(&OperationRequest::TranslateNeural(payload(
            Language::English,
            Language::Korean
        ))));
        assert!(!api_eligible(&OperationRequest::TranslateNeural(payload(
            Language::English,
            Language::German
        ))));
        assert!(!api_eligible(&OperationRequest::TranslateStatistical(payload(
            Language::ChineseSimplified,
            Language::ChineseTraditional
        ))));
    }

    #[test]
    fn test_web_translate_form_carries_session() {
        let session = session();
        let request = OperationRequest::TranslateNeural(payload(Language::English, Language::Korean));
        let form = web_form("Hello", &request, &session);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("deviceId"), "device-1");
        assert_eq!(get("locale"), "ko");
        assert_eq!(get("honorific"), "true");
        assert_eq!(get("text"), "Hello");
        assert_eq!(get("timestamp"), "1700000000000");
        assert_eq!(get("authorization"), session.token(Method::TranslateNeural));
    }

    #[test]
    fn test_api_form_shapes() {
        assert_eq!(
            api_form("hi", &OperationRequest::Detect),
            vec![("query", "hi".to_string())]
        );
        let request = OperationRequest::TranslateNeural(payload(Language::Korean, Language::Japanese));
        assert_eq!(
            api_form("안녕", &request),
            vec![
                ("source", "ko".to_string()),
                ("target", "ja".to_string()),
                ("text", "안녕".to_string()),
            ]
        );
    }

    #[test]
    fn test_tts_web_form() {
        let request = OperationRequest::SynthesizeSpeech(SpeechPayload {
            speaker: "kyuri",
            speed: -1,
            alpha: 0,
            pitch: 2,
        });
        let form = web_form("안녕하세요", &request, &session());
        assert!(form.contains(&("speaker", "kyuri".to_string())));
        assert!(form.contains(&("speed", "-1".to_string())));
        assert!(form.contains(&("pitch", "2".to_string())));
    }

    #[test]
    fn test_preview_truncates_and_escapes() {
        assert_eq!(preview("a\nb"), "a\\nb");
        let long = "x".repeat(100);
        assert_eq!(preview(&long).chars().count(), 41);
    }
}
