//! Machine translation trait
//!
//! The batch image workflow only needs "translate this text into that
//! language". This trait is that seam, so the workflow can run against the
//! Papago client or against a deterministic mock.
//!
//! # Example
//!
//! ```ignore
//! use papago_mt::{MachineTranslator, PapagoClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = PapagoClient::from_env()?;
//!     let result = client.translate_text("Hello, world!", Some("en"), "ko").await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

use crate::error::PapagoResult;
use async_trait::async_trait;

/// Generic trait for machine translation providers
///
/// Methods take `&mut self`: a provider runs one operation at a time.
#[async_trait]
pub trait MachineTranslator: Send {
    /// Translate `text` into `target_code`
    ///
    /// # Arguments
    ///
    /// * `text` - The text to translate; may span several lines
    /// * `source_code` - Source language code, or `None` to detect it
    /// * `target_code` - Target language code (e.g., "ko", "zh-CN")
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The translated text, line structure preserved where the provider allows
    /// * `Err(PapagoError)` - If translation fails
    async fn translate_text(
        &mut self,
        text: &str,
        source_code: Option<&str>,
        target_code: &str,
    ) -> PapagoResult<String>;

    /// Name used in log lines
    fn provider_name(&self) -> &str;
}
