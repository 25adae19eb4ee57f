/// Papago machine translation client
///
/// Language detection, text translation and speech synthesis against the
/// Papago service. Requests go to the official REST API when credentials are
/// configured and the operation is supported there, and fall back to the
/// public web endpoint, whose requests carry an HMAC-signed token derived
/// from the web app's current version.
///
/// # Overview
///
/// 1. **Chunker** - Splits long input at line, sentence or word boundaries
/// 2. **Capability tables** - Language codes, direct pairs, API eligibility, TTS voices
/// 3. **Auth manager** - Builds and refreshes the signed web session
/// 4. **Dispatcher** - REST-then-web failover with jittered retries and re-authentication
/// 5. **Client** - Detect, translate (with English pivoting) and synthesize speech
/// 6. **OCR + batch** - Translate text found in images through an OCR service
///
/// # Example
///
/// ```ignore
/// use papago_mt::{PapagoClient, TranslateOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = PapagoClient::from_env()?;
///     let text = client.translate("Bonjour", "ko", &TranslateOptions::default()).await?;
///     println!("{}", text);
///     Ok(())
/// }
/// ```
pub mod auth;
pub mod batch;
pub mod capability;
pub mod chunker;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod mock;
pub mod ocr;
pub mod translator;


pub use auth::{AuthManager, SessionState};
pub use batch::{BatchEvent, BatchSummary, run_batch, translate_image};
pub use capability::{
    Language, UNKNOWN_CODE, Voice, can_translate_directly, is_api_eligible, is_valid_code,
    use_statistical_engine,
};
pub use chunker::Chunk;
pub use client::{PapagoClient, SpeechOutput, TranslateOptions, TranslatedChunk};
pub use config::{ApiCredential, ClientConfig};
pub use dispatcher::{Backoff, Channel, Dispatcher, ProviderResponse};
pub use endpoint::{Endpoints, Engine, Method, OperationRequest, VoiceParams};
pub use error::{PapagoError, PapagoResult};
pub use mock::{MockMode, MockTranslator};
pub use ocr::{OcrClient, OcrPayload, PostResult, Segment};
pub use translator::MachineTranslator;
