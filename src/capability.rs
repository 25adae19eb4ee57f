//! Language codes and the provider's capability tables
//!
//! Everything here is a table lookup: which codes the provider knows, which
//! pairs it translates end-to-end, which pairs only the statistical engine
//! handles, which pairs the REST API accepts and which TTS speaker serves a
//! language. The functions are pure so the dispatcher and the client can call
//! them as often as they like.

use std::fmt;
use std::str::FromStr;

use crate::error::PapagoError;

/// Code the detector reports when it cannot tell the language
pub const UNKNOWN_CODE: &str = "unk";

/// Languages supported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Korean,
    English,
    Japanese,
    ChineseSimplified,
    ChineseTraditional,
    Vietnamese,
    Indonesian,
    Thai,
    German,
    Russian,
    Spanish,
    Italian,
    French,
}

impl Language {
    pub const ALL: [Language; 13] = [
        Language::Korean,
        Language::English,
        Language::Japanese,
        Language::ChineseSimplified,
        Language::ChineseTraditional,
        Language::Vietnamese,
        Language::Indonesian,
        Language::Thai,
        Language::German,
        Language::Russian,
        Language::Spanish,
        Language::Italian,
        Language::French,
    ];

    /// Provider code for this language
    pub fn code(self) -> &'static str {
        match self {
            Language::Korean => "ko",
            Language::English => "en",
            Language::Japanese => "ja",
            Language::ChineseSimplified => "zh-CN",
            Language::ChineseTraditional => "zh-TW",
            Language::Vietnamese => "vi",
            Language::Indonesian => "id",
            Language::Thai => "th",
            Language::German => "de",
            Language::Russian => "ru",
            Language::Spanish => "es",
            Language::Italian => "it",
            Language::French => "fr",
        }
    }

    /// Look up a provider code. Codes are case-sensitive (`zh-CN`, not `zh-cn`).
    pub fn from_code(code: &str) -> Option<Language> {
        Language::ALL.into_iter().find(|lang| lang.code() == code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = PapagoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_code(s).ok_or_else(|| PapagoError::InvalidLanguageCode(s.to_string()))
    }
}

/// Membership test against the known code set. `unk` is not a member.
pub fn is_valid_code(code: &str) -> bool {
    Language::from_code(code).is_some()
}

fn is_chinese(lang: Language) -> bool {
    matches!(
        lang,
        Language::ChineseSimplified | Language::ChineseTraditional
    )
}

/// Whether the provider translates `source` to `target` without a pivot.
///
/// Every language has a direct path to and from English; the client's pivot
/// relies on that.
pub fn can_translate_directly(source: Language, target: Language) -> bool {
    use Language::*;

    if source == target {
        return true;
    }
    if matches!(source, Korean | English) || matches!(target, Korean | English) {
        return true;
    }
    match (source, target) {
        (Japanese, t) if is_chinese(t) => true,
        (s, Japanese) if is_chinese(s) => true,
        (s, t) => is_chinese(s) && is_chinese(t),
    }
}

/// Pairs the neural engine does not serve
pub fn use_statistical_engine(source: Language, target: Language) -> bool {
    source != target && is_chinese(source) && is_chinese(target)
}

/// Whether the REST API may be tried for a neural translation of this pair.
///
/// The REST API covers fewer pairs than the web endpoint; everything outside
/// this whitelist goes straight to the web channel. Detection is always
/// eligible and is not covered by this function.
pub fn is_api_eligible(source: Language, target: Language) -> bool {
    fn one_way(source: Language, target: Language) -> bool {
        use Language::*;

        match source {
            Korean => target != Korean,
            English => matches!(
                target,
                Japanese | French | ChineseSimplified | ChineseTraditional
            ),
            Japanese => is_chinese(target),
            ChineseSimplified => target == ChineseTraditional,
            _ => false,
        }
    }

    one_way(source, target) || one_way(target, source)
}

/// Speaker gender for speech synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Voice {
    #[default]
    Male,
    Female,
}

/// TTS speaker name for a language, or `None` when the provider has no voice for it
pub fn tts_speaker(language: Language, voice: Voice) -> Option<&'static str> {
    use Language::*;

    let speaker = match (language, voice) {
        (Korean, Voice::Male) => "jinho",
        (Korean, Voice::Female) => "kyuri",
        (English, Voice::Male) => "matt",
        (English, Voice::Female) => "clara",
        (Japanese, Voice::Male) => "shinji",
        (Japanese, Voice::Female) => "yuri",
        (ChineseSimplified, Voice::Male) => "liangliang",
        (ChineseSimplified, Voice::Female) => "meimei",
        (ChineseTraditional, Voice::Male) => "kuanlin",
        (ChineseTraditional, Voice::Female) => "chiahua",
        (Spanish, Voice::Male) => "jose",
        (Spanish, Voice::Female) => "carmen",
        _ => return None,
    };
    Some(speaker)
}

/// Fix up detector output before handing it to callers.
///
/// The detector has been seen to report Simplified Chinese as `py`.
pub fn normalize_detected(code: &str) -> &str {
    match code {
        "py" => Language::ChineseSimplified.code(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn test_is_valid_code() {
        assert!(is_valid_code("ko"));
        assert!(is_valid_code("zh-CN"));
        assert!(!is_valid_code("zh-cn"));
        assert!(!is_valid_code(UNKNOWN_CODE));
        assert!(!is_valid_code(""));
        assert!(!is_valid_code("py"));
    }

    #[test]
    fn test_parse_invalid_code_is_error() {
        match "xx".parse::<Language>() {
            Err(PapagoError::InvalidLanguageCode(code)) => assert_eq!(code, "xx"),
            other => panic!("Expected InvalidLanguageCode, got {:?}", other),
        }
    }

    #[test]
    fn test_english_is_reachable_both_ways() {
        for lang in Language::ALL {
            assert!(can_translate_directly(lang, Language::English), "{lang} -> en");
            assert!(can_translate_directly(Language::English, lang), "en -> {lang}");
        }
    }

    #[test]
    fn test_pairs_needing_pivot() {
        assert!(!can_translate_directly(Language::German, Language::French));
        assert!(!can_translate_directly(Language::Japanese, Language::Vietnamese));
        assert!(!can_translate_directly(Language::Thai, Language::ChineseSimplified));
        assert!(can_translate_directly(Language::Japanese, Language::ChineseTraditional));
        assert!(can_translate_directly(Language::Korean, Language::Thai));
    }

    #[test]
    fn test_statistical_engine_only_between_chinese_scripts() {
        assert!(use_statistical_engine(
            Language::ChineseSimplified,
            Language::ChineseTraditional
        ));
        assert!(use_statistical_engine(
            Language::ChineseTraditional,
            Language::ChineseSimplified
        ));
        assert!(!use_statistical_engine(Language::Korean, Language::English));
        assert!(!use_statistical_engine(
            Language::ChineseSimplified,
            Language::ChineseSimplified
        ));
    }

    #[test]
    fn test_api_whitelist_is_symmetric() {
        for a in Language::ALL {
            for b in Language::ALL {
                assert_eq!(is_api_eligible(a, b), is_api_eligible(b, a), "{a} <-> {b}");
            }
        }
        assert!(is_api_eligible(Language::Korean, Language::English));
        assert!(is_api_eligible(Language::Russian, Language::Korean));
        assert!(!is_api_eligible(Language::English, Language::German));
        assert!(!is_api_eligible(Language::Korean, Language::Korean));
    }

    #[test]
    fn test_tts_speakers() {
        assert_eq!(tts_speaker(Language::Korean, Voice::Female), Some("kyuri"));
        assert_eq!(tts_speaker(Language::English, Voice::Male), Some("matt"));
        assert_eq!(tts_speaker(Language::German, Voice::Male), None);
    }

    #[test]
    fn test_normalize_detected() {
        assert_eq!(normalize_detected("py"), "zh-CN");
        assert_eq!(normalize_detected("ja"), "ja");
        assert_eq!(normalize_detected(UNKNOWN_CODE), UNKNOWN_CODE);
    }
}
