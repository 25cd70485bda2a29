//! Recognised languages, derived language signals and province names.
//!
//! Model answers are free text ("The most likely language is Zulu."), so
//! recognition works on a normalised copy of the answer and looks for exactly
//! one language among names and aliases.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defaults::FAILURE_SENTINEL;
use crate::models::is_placeholder;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\s]+").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, replace punctuation/hyphens with spaces and collapse whitespace.
fn normalise(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced = NON_WORD.replace_all(&lowered, " ");
    SPACES.replace_all(spaced.trim(), " ").into_owned()
}

// =============================================================================
// LANGUAGE
// =============================================================================

/// Bounded enumeration of languages a prediction may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    English,
    Afrikaans,
    IsiZulu,
    IsiXhosa,
    Sesotho,
    Setswana,
    Sepedi,
    Xitsonga,
    SiSwati,
    Tshivenda,
    IsiNdebele,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::English,
        Language::Afrikaans,
        Language::IsiZulu,
        Language::IsiXhosa,
        Language::Sesotho,
        Language::Setswana,
        Language::Sepedi,
        Language::Xitsonga,
        Language::SiSwati,
        Language::Tshivenda,
        Language::IsiNdebele,
    ];

    /// Canonical display name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Afrikaans => "Afrikaans",
            Language::IsiZulu => "isiZulu",
            Language::IsiXhosa => "isiXhosa",
            Language::Sesotho => "Sesotho",
            Language::Setswana => "Setswana",
            Language::Sepedi => "Sepedi",
            Language::Xitsonga => "Xitsonga",
            Language::SiSwati => "siSwati",
            Language::Tshivenda => "Tshivenda",
            Language::IsiNdebele => "isiNdebele",
        }
    }

    /// Normalised names a model may use, canonical name first.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Language::English => &["english"],
            Language::Afrikaans => &["afrikaans"],
            Language::IsiZulu => &["isizulu", "zulu"],
            Language::IsiXhosa => &["isixhosa", "xhosa"],
            Language::Sesotho => &["sesotho", "southern sotho", "sotho"],
            Language::Setswana => &["setswana", "tswana"],
            Language::Sepedi => &["sepedi", "northern sotho", "sesotho sa leboa", "pedi"],
            Language::Xitsonga => &["xitsonga", "tsonga", "shangaan"],
            Language::SiSwati => &["siswati", "swati", "swazi"],
            Language::Tshivenda => &["tshivenda", "venda"],
            Language::IsiNdebele => &["isindebele", "ndebele"],
        }
    }

    /// Comma-separated canonical names for prompts.
    pub fn prompt_list() -> String {
        Self::ALL
            .iter()
            .map(|l| l.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Recognise exactly one language in free text.
    ///
    /// Longer aliases are consumed first so "Northern Sotho" does not also
    /// count as "Sotho". Returns `None` when nothing or more than one
    /// language is mentioned.
    pub fn recognize(text: &str) -> Option<Language> {
        let mut haystack = format!(" {} ", normalise(text));

        let mut aliases: Vec<(&'static str, Language)> = Self::ALL
            .iter()
            .flat_map(|l| l.aliases().iter().map(move |a| (*a, *l)))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut found: Option<Language> = None;
        for (alias, language) in aliases {
            let needle = format!(" {} ", alias);
            if haystack.contains(&needle) {
                haystack = haystack.replace(&needle, "  ");
                match found {
                    None => found = Some(language),
                    Some(existing) if existing == language => {}
                    Some(_) => return None,
                }
            }
        }
        found
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// LANGUAGE SIGNAL
// =============================================================================

/// A derived language value: a recognised language, genuinely absent, or a
/// failed derivation (the sentinel, distinct from absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageSignal {
    Known(Language),
    #[default]
    Unknown,
    Failed,
}

impl LanguageSignal {
    /// Classify a model answer.
    ///
    /// An explicit "unknown", bare or in a sentence that names no language,
    /// is absence. Any other answer naming no single recognised language is
    /// non-conforming output and counts as failure.
    pub fn from_response(text: &str) -> Self {
        let cleaned = text.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
        if is_placeholder(cleaned) || normalise(cleaned) == "n a" {
            return LanguageSignal::Unknown;
        }
        match Language::recognize(cleaned) {
            Some(language) => LanguageSignal::Known(language),
            None if normalise(cleaned).split(' ').any(|w| w == "unknown") => {
                LanguageSignal::Unknown
            }
            None => LanguageSignal::Failed,
        }
    }

    /// The language when present; failures and absence both yield `None`.
    pub fn present(&self) -> Option<Language> {
        match self {
            LanguageSignal::Known(l) => Some(*l),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LanguageSignal::Failed)
    }

    /// Sheet cell: language name, `None`, or the failure sentinel.
    pub fn cell(&self) -> Option<String> {
        match self {
            LanguageSignal::Known(l) => Some(l.name().to_string()),
            LanguageSignal::Unknown => None,
            LanguageSignal::Failed => Some(FAILURE_SENTINEL.to_string()),
        }
    }
}

impl fmt::Display for LanguageSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSignal::Known(l) => f.write_str(l.name()),
            LanguageSignal::Unknown => f.write_str("null"),
            LanguageSignal::Failed => f.write_str(FAILURE_SENTINEL),
        }
    }
}

// =============================================================================
// PROVINCES
// =============================================================================

/// The nine provinces and the normalised spellings/abbreviations accepted for each.
const PROVINCES: [(&str, &[&str]); 9] = [
    ("Eastern Cape", &["eastern cape", "ec", "e cape"]),
    ("Free State", &["free state", "fs", "orange free state"]),
    ("Gauteng", &["gauteng", "gp", "gt"]),
    ("KwaZulu-Natal", &["kwazulu natal", "kzn", "natal", "kwazulunatal"]),
    ("Limpopo", &["limpopo", "lp", "lim"]),
    ("Mpumalanga", &["mpumalanga", "mp"]),
    ("Northern Cape", &["northern cape", "nc", "n cape"]),
    ("North West", &["north west", "northwest", "nw"]),
    ("Western Cape", &["western cape", "wc", "w cape"]),
];

/// Canonical province name when the text names exactly one province.
pub fn canonical_province(text: &str) -> Option<&'static str> {
    let norm = normalise(text);
    if norm.is_empty() {
        return None;
    }
    // Whole-answer match handles abbreviations; containment handles sentences.
    for (name, spellings) in PROVINCES.iter() {
        if spellings.iter().any(|s| *s == norm) {
            return Some(*name);
        }
    }
    let padded = format!(" {} ", norm);
    let hits: Vec<&'static str> = PROVINCES
        .iter()
        .filter(|(_, spellings)| {
            spellings
                .iter()
                .filter(|s| s.len() > 3)
                .any(|s| padded.contains(&format!(" {} ", s)))
        })
        .map(|(name, _)| *name)
        .collect();
    match hits.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// Whether a province cell can seed the province-language estimate.
pub fn is_usable_province(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => !is_placeholder(v) && !v.trim().eq_ignore_ascii_case(FAILURE_SENTINEL),
    }
}
