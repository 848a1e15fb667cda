//! Language resolution
//!
//! Turns the language token of a track file name (`en`, `en-US`, `fra`,
//! `pt_BR`) into a canonical ISO 639-3 code and an English display name.
//! The token is parsed as a Unicode language identifier first so region,
//! script and variant subtags are accepted and ignored. Bibliographic
//! ISO 639-2 codes (`ger`, `fre`) and withdrawn two-letter codes (`iw`)
//! resolve to the language that replaced them.

use std::fmt;

use unic_langid::LanguageIdentifier;

use crate::error::LanguageError;

/// ISO 639-2/B codes and withdrawn ISO 639-1 codes, with their ISO 639-3
/// replacement
const LEGACY_CODES: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("mao", "mri"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("tib", "bod"),
    ("wel", "cym"),
    ("in", "ind"),
    ("iw", "heb"),
    ("ji", "yid"),
    ("jw", "jav"),
    ("mo", "ron"),
];

fn replacement_code(subtag: &str) -> Option<&'static str> {
    LEGACY_CODES
        .iter()
        .find(|(legacy, _)| *legacy == subtag)
        .map(|(_, code)| *code)
}

/// A resolved track language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    /// ISO 639-3 code, lowercase
    pub code: String,
    /// English name of the language
    pub display_name: String,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.code)
    }
}

/// Maps language tokens to [`Language`]s.
///
/// Stateless: the same token always resolves to the same language.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanguageResolver;

impl LanguageResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, token: &str) -> Result<Language, LanguageError> {
        let trimmed = token.trim();
        let langid: LanguageIdentifier = trimmed
            .parse()
            .map_err(|_| LanguageError::Unparsable(trimmed.to_string()))?;

        let subtag = langid.language.as_str();
        if subtag == "und" || subtag.is_empty() {
            return Err(LanguageError::Undetermined(trimmed.to_string()));
        }

        let iso = match (replacement_code(subtag), subtag.len()) {
            (Some(code), _) => isolang::Language::from_639_3(code),
            (None, 2) => isolang::Language::from_639_1(subtag),
            (None, 3) => isolang::Language::from_639_3(subtag),
            _ => None,
        }
        .ok_or_else(|| LanguageError::Unknown(trimmed.to_string()))?;

        Ok(Language {
            code: iso.to_639_3().to_string(),
            display_name: iso.to_name().to_string(),
        })
    }

    /// Display name for an already canonical ISO 639-3 code
    pub fn display_name(&self, code: &str) -> Option<&'static str> {
        isolang::Language::from_639_3(code).map(|l| l.to_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_letter_code() {
        let lang = LanguageResolver::new().resolve("en").unwrap();
        assert_eq!(lang.code, "eng");
        assert_eq!(lang.display_name, "English");
    }

    #[test]
    fn test_region_subtag_is_ignored() {
        let resolver = LanguageResolver::new();
        assert_eq!(resolver.resolve("en-US").unwrap().code, "eng");
        assert_eq!(resolver.resolve("pt_BR").unwrap().code, "por");
        assert_eq!(resolver.resolve("zh-Hant").unwrap().code, "zho");
    }

    #[test]
    fn test_three_letter_code() {
        let lang = LanguageResolver::new().resolve("fra").unwrap();
        assert_eq!(lang.code, "fra");
        assert_eq!(lang.display_name, "French");
    }

    #[test]
    fn test_bibliographic_codes() {
        let resolver = LanguageResolver::new();
        let ger = resolver.resolve("ger").unwrap();
        assert_eq!(ger.code, "deu");
        assert_eq!(ger.display_name, "German");
        assert_eq!(resolver.resolve("fre").unwrap().code, "fra");
        assert_eq!(resolver.resolve("chi").unwrap().code, "zho");
        assert_eq!(resolver.resolve("ger-AT").unwrap().code, "deu");
    }

    #[test]
    fn test_withdrawn_two_letter_codes() {
        let resolver = LanguageResolver::new();
        let hebrew = resolver.resolve("iw").unwrap();
        assert_eq!(hebrew.code, "heb");
        assert_eq!(hebrew.display_name, "Hebrew");
        assert_eq!(resolver.resolve("in").unwrap().code, "ind");
        assert_eq!(resolver.resolve("ji").unwrap(), resolver.resolve("yi").unwrap());
    }

    #[test]
    fn test_legacy_codes_resolve_in_iso_tables() {
        for (_, code) in LEGACY_CODES {
            assert!(isolang::Language::from_639_3(code).is_some(), "{}", code);
        }
    }

    #[test]
    fn test_resolve_is_pure() {
        let resolver = LanguageResolver::new();
        for token in ["de", "es-MX", "jpn", "fr"] {
            assert_eq!(resolver.resolve(token), resolver.resolve(token));
        }
    }

    #[test]
    fn test_invalid_tokens() {
        let resolver = LanguageResolver::new();
        assert!(matches!(
            resolver.resolve("not a language"),
            Err(LanguageError::Unparsable(_))
        ));
        assert!(matches!(
            resolver.resolve("und"),
            Err(LanguageError::Undetermined(_))
        ));
        assert!(matches!(
            resolver.resolve("qq"),
            Err(LanguageError::Unknown(_))
        ));
    }

    #[test]
    fn test_display_name_for_code() {
        let resolver = LanguageResolver::new();
        assert_eq!(resolver.display_name("deu"), Some("German"));
        assert_eq!(resolver.display_name("zzz"), None);
    }
}
