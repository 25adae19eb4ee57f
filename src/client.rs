//! The Papago client
//!
//! [`PapagoClient`] ties the chunker, the capability tables and the
//! dispatcher together into three operations: language detection, text
//! translation and speech synthesis. Chunks are sent one after another; a
//! failure on any chunk fails the whole operation.
//!
//! # Example
//!
//! ```ignore
//! use papago_mt::{ClientConfig, PapagoClient, TranslateOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = PapagoClient::new(ClientConfig::default())?;
//!
//!     let code = client.detect_language("こんにちは").await?;
//!     assert_eq!(code, "ja");
//!
//!     let korean = client
//!         .translate("Hello", "ko", &TranslateOptions::from_source("en"))
//!         .await?;
//!     println!("{}", korean);
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::USER_AGENT;
use crate::capability::{
    Language, UNKNOWN_CODE, can_translate_directly, normalize_detected, tts_speaker,
    use_statistical_engine,
};
use crate::chunker::{self, DEFAULT_MAX_CHUNK};
use crate::config::ClientConfig;
use crate::dispatcher::{Dispatcher, ProviderResponse, preview};
use crate::endpoint::{Engine, Method, OperationRequest, SpeechPayload, TranslatePayload, VoiceParams};
use crate::error::{PapagoError, PapagoResult};
use crate::translator::MachineTranslator;

/// Options for [`PapagoClient::translate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Source language code; detected when `None`
    pub source: Option<String>,
    /// Requested engine; pairs the neural engine lacks are switched to statistical
    pub engine: Engine,
    /// Ask for honorific forms (mainly affects Korean output)
    pub honorific: bool,
}

impl TranslateOptions {
    pub fn from_source(source: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_honorific(mut self, honorific: bool) -> Self {
        self.honorific = honorific;
        self
    }
}

/// One translated chunk, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedChunk {
    pub index: usize,
    pub text: String,
    /// The provider's result object; `None` for chunks passed through untouched
    pub raw: Option<Value>,
}

/// Result of [`PapagoClient::synthesize_speech`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechOutput {
    /// Chunk index → audio URL
    pub urls: BTreeMap<usize, String>,
    /// Where the first chunk's audio was written, if saving was requested
    pub saved: Option<PathBuf>,
}

#[derive(Deserialize)]
struct SpeechBody {
    id: String,
}

enum Detection {
    Blank,
    Unknown,
    Found { code: String, raw: Value },
}

fn passthrough(text: &str) -> Vec<TranslatedChunk> {
    if text.is_empty() {
        return Vec::new();
    }
    vec![TranslatedChunk {
        index: 0,
        text: text.to_string(),
        raw: None,
    }]
}

fn join_chunks(chunks: &[TranslatedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the translated text out of either channel's response shape.
///
/// The REST API nests the result under `message.result`; the web endpoint
/// returns it at the top level.
fn translated_text(method: Method, response: &ProviderResponse) -> PapagoResult<(String, Value)> {
    let raw = match response.body.get("message") {
        Some(message) => message.get("result").cloned().ok_or_else(|| {
            PapagoError::UnexpectedResponse {
                method,
                detail: format!("missing message.result: {}", response.body),
            }
        })?,
        None => response.body.clone(),
    };

    let text = raw
        .get("translatedText")
        .and_then(Value::as_str)
        .ok_or_else(|| PapagoError::UnexpectedResponse {
            method,
            detail: format!("missing translatedText: {}", response.body),
        })?
        .to_string();
    Ok((text, raw))
}

/// Keep the provider-issued id usable as a file name
fn audio_file_name(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.mp3", stem)
}

pub struct PapagoClient {
    dispatcher: Dispatcher,
}

impl PapagoClient {
    /// Create a client. No network traffic happens until the first operation.
    pub fn new(config: ClientConfig) -> PapagoResult<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| PapagoError::Config(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| PapagoError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let backoff = config.backoff();
        Ok(Self {
            dispatcher: Dispatcher::new(
                http,
                config.endpoints,
                config.credentials,
                config.retry,
                backoff,
            ),
        })
    }

    /// Create a client from `PAPAGO_*` environment variables
    pub fn from_env() -> PapagoResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Abandon in-flight requests and stop dispatching once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.dispatcher.set_cancellation(cancel);
        self
    }

    /// Build the web session now rather than on first use
    pub async fn authenticate(&mut self) -> PapagoResult<()> {
        self.dispatcher.reauthenticate().await
    }

    /// How many web sessions this client has built
    pub fn session_generation(&self) -> u64 {
        self.dispatcher.auth().generation()
    }

    pub fn device_id(&self) -> &str {
        self.dispatcher.auth().device_id()
    }

    async fn detect(&mut self, text: &str) -> PapagoResult<Detection> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Detection::Blank);
        }

        for chunk in chunker::split(text, DEFAULT_MAX_CHUNK, true) {
            if chunk.is_blank() {
                continue;
            }
            let response = self
                .dispatcher
                .send(chunk.body(), &OperationRequest::Detect)
                .await?;
            let mut raw = match response.body {
                Value::Object(map) => map,
                other => {
                    return Err(PapagoError::UnexpectedResponse {
                        method: Method::Detect,
                        detail: format!("expected a JSON object: {}", other),
                    });
                }
            };
            let lang_code = raw
                .get("langCode")
                .and_then(Value::as_str)
                .ok_or_else(|| PapagoError::UnexpectedResponse {
                    method: Method::Detect,
                    detail: format!("missing langCode: {:?}", raw),
                })?
                .to_string();

            if lang_code != UNKNOWN_CODE {
                let code = normalize_detected(&lang_code).to_string();
                raw.insert("langCode".to_string(), Value::String(code.clone()));
                debug!("Detected {} for '{}'", code, preview(text));
                let raw = Value::Object(raw);
                return Ok(Detection::Found { code, raw });
            }
        }

        debug!("No language detected for '{}'", preview(text));
        Ok(Detection::Unknown)
    }

    /// Detect the language of `text`.
    ///
    /// Returns `""` for blank input and [`UNKNOWN_CODE`] when no chunk could
    /// be classified. `unk` is not a valid code, so feeding it to
    /// [`translate`](Self::translate) fails with `InvalidLanguageCode`.
    pub async fn detect_language(&mut self, text: &str) -> PapagoResult<String> {
        Ok(match self.detect(text).await? {
            Detection::Blank => String::new(),
            Detection::Unknown => UNKNOWN_CODE.to_string(),
            Detection::Found { code, .. } => code,
        })
    }

    /// The provider's detection object for the first classified chunk
    pub async fn detect_language_raw(&mut self, text: &str) -> PapagoResult<Option<Value>> {
        Ok(match self.detect(text).await? {
            Detection::Found { raw, .. } => Some(raw),
            Detection::Blank | Detection::Unknown => None,
        })
    }

    /// Translate `text` into `target`, joining chunk results with newlines
    pub async fn translate(
        &mut self,
        text: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> PapagoResult<String> {
        let chunks = self.translate_raw(text, target, options).await?;
        Ok(join_chunks(&chunks))
    }

    /// Translate and keep each chunk's raw provider result.
    ///
    /// No-op cases (blank input, same source and target) come back as the
    /// input in a single untouched chunk.
    pub async fn translate_raw(
        &mut self,
        text: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> PapagoResult<Vec<TranslatedChunk>> {
        if text.trim().is_empty() {
            return Ok(passthrough(text));
        }

        let target: Language = target.parse()?;
        let mut source: Language = match &options.source {
            Some(code) => code.parse()?,
            None => self.detect_language(text).await?.parse()?,
        };
        if source == target {
            return Ok(passthrough(text));
        }

        let pivoted: String;
        let text = if can_translate_directly(source, target) {
            text
        } else {
            let english = Language::English;
            if !can_translate_directly(source, english) || !can_translate_directly(english, target)
            {
                return Err(PapagoError::NoTranslationPath {
                    source_code: source.to_string(),
                    target_code: target.to_string(),
                });
            }
            info!("No direct path {} -> {}, pivoting through English", source, target);
            let leg = self
                .translate_direct(text, source, english, Engine::Neural, false)
                .await?;
            pivoted = join_chunks(&leg);
            source = english;
            pivoted.as_str()
        };

        self.translate_direct(text, source, target, options.engine, options.honorific)
            .await
    }

    async fn translate_direct(
        &mut self,
        text: &str,
        source: Language,
        target: Language,
        engine: Engine,
        honorific: bool,
    ) -> PapagoResult<Vec<TranslatedChunk>> {
        let engine = if use_statistical_engine(source, target) {
            Engine::Statistical
        } else {
            engine
        };
        let request = OperationRequest::translate(
            engine,
            TranslatePayload {
                source,
                target,
                honorific,
            },
        );
        let method = request.method();

        let chunks = chunker::split(text, DEFAULT_MAX_CHUNK, false);
        debug!(%method, chunks = chunks.len(), "Translating {} -> {}", source, target);

        let mut translated = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.is_blank() {
                translated.push(TranslatedChunk {
                    index: chunk.index,
                    text: chunk.body().to_string(),
                    raw: None,
                });
                continue;
            }

            let response = self.dispatcher.send(chunk.body(), &request).await?;
            let (text, raw) = translated_text(method, &response)?;
            translated.push(TranslatedChunk {
                index: chunk.index,
                text,
                raw: Some(raw),
            });
        }
        Ok(translated)
    }

    /// Synthesize speech for `text`.
    ///
    /// Returns `Ok(None)` when the provider has no voice for the detected
    /// language. With `save_dir`, the first chunk's audio is downloaded
    /// there as `{id}.mp3`.
    pub async fn synthesize_speech(
        &mut self,
        text: &str,
        voice: &VoiceParams,
        save_dir: Option<&Path>,
    ) -> PapagoResult<Option<SpeechOutput>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Some(SpeechOutput::default()));
        }

        let code = self.detect_language(text).await?;
        let Some(speaker) = Language::from_code(&code).and_then(|lang| tts_speaker(lang, voice.voice))
        else {
            warn!(
                "Speech for '{}' ({}, {:?} voice) is not supported by the provider",
                preview(text),
                code,
                voice.voice
            );
            return Ok(None);
        };

        let request = OperationRequest::SynthesizeSpeech(SpeechPayload::new(speaker, voice));

        let mut output = SpeechOutput::default();
        for chunk in chunker::split(text, DEFAULT_MAX_CHUNK, false) {
            if chunk.is_blank() {
                continue;
            }
            let response = self.dispatcher.send(chunk.body(), &request).await?;
            let body: SpeechBody = serde_json::from_value(response.body.clone()).map_err(|e| {
                PapagoError::UnexpectedResponse {
                    method: Method::SynthesizeSpeech,
                    detail: format!("{}: {}", e, response.body),
                }
            })?;
            let url = self.dispatcher.endpoints().audio_url(&body.id);

            if chunk.index == 0
                && let Some(dir) = save_dir
            {
                let path = dir.join(audio_file_name(&body.id));
                self.download_audio(&url, &path).await?;
                info!("Saved speech audio to {}", path.display());
                output.saved = Some(path);
            }
            output.urls.insert(chunk.index, url);
        }
        Ok(Some(output))
    }

    async fn download_audio(&self, url: &str, path: &Path) -> PapagoResult<()> {
        let http = self.dispatcher.http();
        let bytes = self
            .dispatcher
            .cancellable(async {
                let response = http
                    .get(url)
                    .header("user-agent", USER_AGENT)
                    .send()
                    .await?
                    .error_for_status()?;
                response.bytes().await
            })
            .await??;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        Ok(())
    }
}

impl std::fmt::Debug for PapagoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PapagoClient")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for PapagoClient {
    async fn translate_text(
        &mut self,
        text: &str,
        source_code: Option<&str>,
        target_code: &str,
    ) -> PapagoResult<String> {
        let options = TranslateOptions {
            source: source_code.map(str::to_string),
            ..Default::default()
        };
        self.translate(text, target_code, &options).await
    }

    fn provider_name(&self) -> &str {
        "Papago"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Channel;
    use serde_json::json;

    fn offline_client() -> PapagoClient {
        let config = ClientConfig {
            endpoints: crate::endpoint::Endpoints::with_base("http://127.0.0.1:9"),
            ..Default::default()
        };
        PapagoClient::new(config).unwrap()
    }

    #[test]
    fn test_translated_text_from_api_shape() {
        let response = ProviderResponse {
            channel: Channel::Api,
            body: json!({"message": {"result": {"srcLangType": "en", "translatedText": "안녕"}}}),
        };
        let (text, raw) = translated_text(Method::TranslateNeural, &response).unwrap();
        assert_eq!(text, "안녕");
        assert_eq!(raw["srcLangType"], "en");
    }

    #[test]
    fn test_translated_text_from_web_shape() {
        let response = ProviderResponse {
            channel: Channel::Web,
            body: json!({"translatedText": "안녕", "dict": null}),
        };
        let (text, _) = translated_text(Method::TranslateNeural, &response).unwrap();
        assert_eq!(text, "안녕");
    }

    #[test]
    fn test_translated_text_missing_field() {
        let response = ProviderResponse {
            channel: Channel::Web,
            body: json!({"errorCode": "N2MT05"}),
        };
        assert!(matches!(
            translated_text(Method::TranslateNeural, &response),
            Err(PapagoError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_audio_file_name_is_sanitized() {
        assert_eq!(audio_file_name("abc-123_x"), "abc-123_x.mp3");
        assert_eq!(audio_file_name("../etc/pw"), "___etc_pw.mp3");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig {
            credentials: vec![crate::config::ApiCredential::new("", "secret")],
            ..Default::default()
        };
        assert!(matches!(PapagoClient::new(config), Err(PapagoError::Config(_))));
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let config = ClientConfig {
            proxy: Some("http://[::1".to_string()),
            ..Default::default()
        };
        assert!(matches!(PapagoClient::new(config), Err(PapagoError::Config(_))));
    }

    // No-op paths never reach the network, so an unroutable endpoint is fine

    #[tokio::test]
    async fn test_empty_input_is_returned_unchanged() {
        let mut client = offline_client();
        assert_eq!(client.detect_language("").await.unwrap(), "");
        assert_eq!(client.detect_language("   \n").await.unwrap(), "");
        assert_eq!(
            client.translate("", "ko", &TranslateOptions::default()).await.unwrap(),
            ""
        );
        assert_eq!(
            client
                .synthesize_speech("", &VoiceParams::default(), None)
                .await
                .unwrap(),
            Some(SpeechOutput::default())
        );
        assert_eq!(client.session_generation(), 0);
    }

    #[tokio::test]
    async fn test_same_source_and_target_is_noop() {
        let mut client = offline_client();
        let options = TranslateOptions::from_source("en");
        assert_eq!(client.translate("Hello", "en", &options).await.unwrap(), "Hello");
        let text = "multi\nline\n\ntext";
        assert_eq!(client.translate(text, "en", &options).await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_invalid_codes_fail_before_any_request() {
        let mut client = offline_client();
        match client
            .translate("Hello", "xx", &TranslateOptions::from_source("en"))
            .await
        {
            Err(PapagoError::InvalidLanguageCode(code)) => assert_eq!(code, "xx"),
            other => panic!("Expected InvalidLanguageCode, got {:?}", other),
        }
        match client
            .translate("Hello", "ko", &TranslateOptions::from_source(UNKNOWN_CODE))
            .await
        {
            Err(PapagoError::InvalidLanguageCode(code)) => assert_eq!(code, "unk"),
            other => panic!("Expected InvalidLanguageCode, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_client_stops_dispatching() {
        let cancel = CancellationToken::new();
        let mut client = offline_client().with_cancellation(cancel.clone());
        cancel.cancel();
        assert!(matches!(
            client
                .translate("Hello", "ko", &TranslateOptions::from_source("en"))
                .await,
            Err(PapagoError::Cancelled)
        ));
    }
}
