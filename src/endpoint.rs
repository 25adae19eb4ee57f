//! Provider endpoints and the operation requests sent to them
//!
//! An [`OperationRequest`] is resolved once when the client builds it; the
//! dispatcher only reads its [`Method`] and payload and never re-interprets
//! a method name.

use std::fmt;

use serde::Deserialize;

use crate::capability::{Language, Voice};

/// Distinguished endpoint categories. Each has its own web URL and token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Detect,
    TranslateNeural,
    TranslateStatistical,
    SynthesizeSpeech,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::Detect,
        Method::TranslateNeural,
        Method::TranslateStatistical,
        Method::SynthesizeSpeech,
    ];

    /// The provider's short name for the method
    pub fn name(self) -> &'static str {
        match self {
            Method::Detect => "dect",
            Method::TranslateNeural => "n2mt",
            Method::TranslateStatistical => "nsmt",
            Method::SynthesizeSpeech => "tts",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Translation engine requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    Neural,
    Statistical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatePayload {
    pub source: Language,
    pub target: Language,
    pub honorific: bool,
}

/// Voice parameters for speech synthesis. Speed, alpha and pitch range over -5..=5.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceParams {
    pub voice: Voice,
    pub speed: i8,
    pub alpha: i8,
    pub pitch: i8,
}

impl VoiceParams {
    pub fn new(voice: Voice, speed: i8, alpha: i8, pitch: i8) -> Self {
        Self {
            voice,
            speed: clamp_level(speed),
            alpha: clamp_level(alpha),
            pitch: clamp_level(pitch),
        }
    }
}

fn clamp_level(level: i8) -> i8 {
    level.clamp(-5, 5)
}

/// Speech request resolved to a concrete speaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechPayload {
    pub speaker: &'static str,
    pub speed: i8,
    pub alpha: i8,
    pub pitch: i8,
}

impl SpeechPayload {
    /// Fields of `VoiceParams` are public, so levels are clamped again here
    pub fn new(speaker: &'static str, voice: &VoiceParams) -> Self {
        Self {
            speaker,
            speed: clamp_level(voice.speed),
            alpha: clamp_level(voice.alpha),
            pitch: clamp_level(voice.pitch),
        }
    }
}

/// One logical operation, with exactly the payload its method needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Detect,
    TranslateNeural(TranslatePayload),
    TranslateStatistical(TranslatePayload),
    SynthesizeSpeech(SpeechPayload),
}

impl OperationRequest {
    pub fn translate(engine: Engine, payload: TranslatePayload) -> Self {
        match engine {
            Engine::Neural => OperationRequest::TranslateNeural(payload),
            Engine::Statistical => OperationRequest::TranslateStatistical(payload),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            OperationRequest::Detect => Method::Detect,
            OperationRequest::TranslateNeural(_) => Method::TranslateNeural,
            OperationRequest::TranslateStatistical(_) => Method::TranslateStatistical,
            OperationRequest::SynthesizeSpeech(_) => Method::SynthesizeSpeech,
        }
    }
}

pub const DEFAULT_API_BASE: &str = "https://openapi.naver.com";
pub const DEFAULT_WEB_BASE: &str = "https://papago.naver.com";

/// Base URLs of the two channels
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub api_base: String,
    pub web_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Both channels served from one base, as a local mock server does
    pub fn with_base(base: &str) -> Self {
        Self {
            api_base: base.to_string(),
            web_base: base.to_string(),
        }
    }

    fn join(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// REST URL for the method; `None` for methods the REST API does not offer
    pub fn api_url(&self, method: Method) -> Option<String> {
        let path = match method {
            Method::Detect => "v1/papago/detectLangs",
            Method::TranslateNeural => "v1/papago/n2mt",
            Method::TranslateStatistical | Method::SynthesizeSpeech => return None,
        };
        Some(Self::join(&self.api_base, path))
    }

    pub fn web_url(&self, method: Method) -> String {
        let path = match method {
            Method::Detect => "apis/langs/dect",
            Method::TranslateNeural => "apis/n2mt/translate",
            Method::TranslateStatistical => "apis/nsmt/translate",
            Method::SynthesizeSpeech => "apis/tts/makeID",
        };
        Self::join(&self.web_base, path)
    }

    /// Landing page that references the front-end bundle
    pub fn home_url(&self) -> String {
        Self::join(&self.web_base, "")
    }

    /// URL of a front-end asset referenced by the landing page
    pub fn asset_url(&self, path: &str) -> String {
        Self::join(&self.web_base, path)
    }

    /// Where a synthesized speech id can be downloaded from
    pub fn audio_url(&self, id: &str) -> String {
        Self::join(&self.web_base, &format!("apis/tts/{}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.web_url(Method::TranslateNeural),
            "https://papago.naver.com/apis/n2mt/translate"
        );
        assert_eq!(
            endpoints.api_url(Method::Detect).as_deref(),
            Some("https://openapi.naver.com/v1/papago/detectLangs")
        );
        assert_eq!(endpoints.home_url(), "https://papago.naver.com/");
        assert_eq!(
            endpoints.audio_url("abc"),
            "https://papago.naver.com/apis/tts/abc"
        );
    }

    #[test]
    fn test_api_url_missing_for_web_only_methods() {
        let endpoints = Endpoints::default();
        assert!(endpoints.api_url(Method::TranslateStatistical).is_none());
        assert!(endpoints.api_url(Method::SynthesizeSpeech).is_none());
    }

    #[test]
    fn test_with_base_trims_slashes() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:9999/");
        assert_eq!(
            endpoints.asset_url("/main.abc.chunk.js"),
            "http://127.0.0.1:9999/main.abc.chunk.js"
        );
    }

    #[test]
    fn test_request_method() {
        let payload = TranslatePayload {
            source: Language::Korean,
            target: Language::English,
            honorific: false,
        };
        assert_eq!(
            OperationRequest::translate(Engine::Statistical, payload.clone()).method(),
            Method::TranslateStatistical
        );
        assert_eq!(
            OperationRequest::translate(Engine::Neural, payload).method(),
            Method::TranslateNeural
        );
        assert_eq!(OperationRequest::Detect.method().name(), "dect");
    }

    #[test]
    fn test_voice_params_are_clamped() {
        let params = VoiceParams::new(Voice::Female, 9, -9, 3);
        assert_eq!(params.speed, 5);
        assert_eq!(params.alpha, -5);
        assert_eq!(params.pitch, 3);
    }

    #[test]
    fn test_speech_payload_clamps_literal_params() {
        let params = VoiceParams {
            voice: Voice::Male,
            speed: 100,
            alpha: -100,
            pitch: -2,
        };
        let payload = SpeechPayload::new("jinho", &params);
        assert_eq!(payload.speaker, "jinho");
        assert_eq!(payload.speed, 5);
        assert_eq!(payload.alpha, -5);
        assert_eq!(payload.pitch, -2);
    }
}
