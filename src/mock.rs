//! Mock Machine Translator for testing
//!
//! A deterministic, network-free [`MachineTranslator`] for exercising the
//! batch workflow without credentials or a reachable provider.
//!
//! # Example
//!
//! ```ignore
//! use papago_mt::{MachineTranslator, MockMode, MockTranslator};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mut mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate_text("hello", Some("en"), "ko").await.unwrap();
//!     assert_eq!(result, "hello_ko");
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{PapagoError, PapagoResult};
use crate::translator::MachineTranslator;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target code to every line: "hello" → "hello_ko"
    Suffix,

    /// (line, target_code) → translation, falling back to `Suffix`
    Mappings(HashMap<(String, String), String>),

    /// Fail every call with this message
    Error(String),

    /// Return input unchanged
    NoOp,
}

#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    calls: usize,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self { mode, calls: 0 }
    }

    /// Number of `translate_text` calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn translate_line(&self, line: &str, target: &str) -> String {
        match &self.mode {
            MockMode::Mappings(map) => map
                .get(&(line.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", line, target)),
            MockMode::NoOp => line.to_string(),
            _ => format!("{}_{}", line, target),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate_text(
        &mut self,
        text: &str,
        _source_code: Option<&str>,
        target_code: &str,
    ) -> PapagoResult<String> {
        self.calls += 1;
        if let MockMode::Error(msg) = &self.mode {
            return Err(PapagoError::RequestExhausted {
                method: crate::endpoint::Method::TranslateNeural,
                status: None,
                body: msg.clone(),
            });
        }
        Ok(text
            .split('\n')
            .map(|line| self.translate_line(line, target_code))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suffix_per_line() {
        let mut mock = MockTranslator::new(MockMode::Suffix);
        let result = mock.translate_text("hello\nworld", None, "ko").await.unwrap();
        assert_eq!(result, "hello_ko\nworld_ko");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mapping_with_fallback() {
        let mut map = HashMap::new();
        map.insert(("hello".to_string(), "ko".to_string()), "안녕".to_string());
        let mut mock = MockTranslator::new(MockMode::Mappings(map));
        let result = mock.translate_text("hello\nbye", Some("en"), "ko").await.unwrap();
        assert_eq!(result, "안녕\nbye_ko");
    }

    #[tokio::test]
    async fn test_error_mode() {
        let mut mock = MockTranslator::new(MockMode::Error("banned".to_string()));
        match mock.translate_text("hello", None, "ko").await {
            Err(PapagoError::RequestExhausted { body, .. }) => assert_eq!(body, "banned"),
            other => panic!("Expected RequestExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_noop() {
        let mut mock = MockTranslator::new(MockMode::NoOp);
        assert_eq!(mock.translate_text("같은", None, "ko").await.unwrap(), "같은");
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(MockTranslator::new(MockMode::Suffix).provider_name(), "Mock Translator");
    }
}
