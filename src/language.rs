//! Language table — the single source of truth for which codes the text
//! cleaner knows and which the XTTS v2 model can synthesize.
//!
//! Adding or removing a language is a one-line change to [`LANGUAGES`].

use crate::error::{Error, Result};

/// Language-specific punctuation handling applied by the text cleaner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunctuationRule {
    /// Whitespace normalisation only.
    Plain,
    /// French: no space before `? ! : ;`, none after `«`/`»`.
    French,
    /// Spanish: no space before `¡ ¿ ? !`.
    Spanish,
}

/// One row of the language table.
#[derive(Debug, Clone, Copy)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    /// Whether the voice-cloning model accepts this code.
    pub synthesis: bool,
    pub punctuation: PunctuationRule,
}

use PunctuationRule::*;

#[rustfmt::skip]
pub static LANGUAGES: &[Language] = &[
    Language { code: "en",    name: "English",    synthesis: true,  punctuation: Plain   },
    Language { code: "fr",    name: "French",     synthesis: true,  punctuation: French  },
    Language { code: "de",    name: "German",     synthesis: true,  punctuation: Plain   },
    Language { code: "es",    name: "Spanish",    synthesis: true,  punctuation: Spanish },
    Language { code: "it",    name: "Italian",    synthesis: true,  punctuation: Plain   },
    Language { code: "pt",    name: "Portuguese", synthesis: true,  punctuation: Plain   },
    Language { code: "pl",    name: "Polish",     synthesis: true,  punctuation: Plain   },
    Language { code: "tr",    name: "Turkish",    synthesis: true,  punctuation: Plain   },
    Language { code: "ru",    name: "Russian",    synthesis: true,  punctuation: Plain   },
    Language { code: "nl",    name: "Dutch",      synthesis: true,  punctuation: Plain   },
    Language { code: "cs",    name: "Czech",      synthesis: true,  punctuation: Plain   },
    Language { code: "ar",    name: "Arabic",     synthesis: true,  punctuation: Plain   },
    Language { code: "zh-cn", name: "Chinese",    synthesis: true,  punctuation: Plain   },
    Language { code: "hu",    name: "Hungarian",  synthesis: true,  punctuation: Plain   },
    Language { code: "ko",    name: "Korean",     synthesis: true,  punctuation: Plain   },
    Language { code: "ja",    name: "Japanese",   synthesis: true,  punctuation: Plain   },
    Language { code: "hi",    name: "Hindi",      synthesis: true,  punctuation: Plain   },
    // XTTS v2 has no Swedish voice; texts can still be prepared.
    Language { code: "sv",    name: "Swedish",    synthesis: false, punctuation: Plain   },
];

/// Look up a code (case-insensitive).
pub fn lookup(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Accept any code the text cleaner knows.
pub fn require_known(code: &str) -> Result<&'static Language> {
    lookup(code).ok_or_else(|| Error::unsupported(code, "not in the language table"))
}

/// Accept only codes the voice-cloning model can synthesize.
pub fn require_synthesizable(code: &str) -> Result<&'static Language> {
    let lang = require_known(code)?;
    if lang.synthesis {
        Ok(lang)
    } else {
        Err(Error::unsupported(
            code,
            format!("{} is not supported by the voice-cloning model", lang.name),
        ))
    }
}

/// Codes the model can synthesize, in table order.
pub fn synthesizable_codes() -> impl Iterator<Item = &'static str> {
    LANGUAGES.iter().filter(|l| l.synthesis).map(|l| l.code)
}
