//! Text cleaning pipeline — language-aware normalisation applied before
//! synthesis, plus the paragraph/sentence chunker used by the preparer.
//!
//! The cleaner never translates or rewrites words: it strips characters the
//! voice model cannot pronounce, normalises whitespace and applies the
//! punctuation rule of the language table.

use std::borrow::Cow;

use fancy_regex::Regex;
use once_cell::sync::Lazy;

use crate::language::{Language, PunctuationRule};

// ─────────────────────────────────────────────────────────────────────────────
// Compiled regexes (lazily initialised once)
// ─────────────────────────────────────────────────────────────────────────────

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[\w.+-]+@[\w-]+\.[a-z]{2,}\b").unwrap());
static RE_HTML: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
// Character classes only, no look-around.
static RE_CONTROL: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\p{Cc}").unwrap());
static RE_UNSUPPORTED: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"[\p{Cf}\p{Co}\p{So}\p{Sk}]").unwrap());
static RE_SPACES: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\s+").unwrap());
// French: no space before high punctuation, none inside guillemets.
static RE_FR_HIGH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(?=[?!:;])").unwrap());
static RE_FR_OPEN_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=«)\s+").unwrap());
static RE_FR_CLOSE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(?=»)").unwrap());
// Spanish: closing marks hug the preceding word, inverted marks the next one.
static RE_ES_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(?=[?!])").unwrap());
static RE_ES_INVERTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=[¡¿])\s+").unwrap());

pub fn remove_urls(text: &str) -> Cow<'_, str> {
    RE_URL.replace_all(text, "")
}

pub fn remove_emails(text: &str) -> Cow<'_, str> {
    RE_EMAIL.replace_all(text, "")
}

pub fn remove_html_tags(text: &str) -> Cow<'_, str> {
    RE_HTML.replace_all(text, " ")
}

/// Drop emoji, private-use and format characters; turn control codes into spaces.
pub fn strip_unsupported(text: &str) -> String {
    let text = RE_CONTROL.replace_all(text, " ");
    RE_UNSUPPORTED.replace_all(&text, "").into_owned()
}

pub fn remove_extra_whitespace(text: &str) -> String {
    RE_SPACES.replace_all(text.trim(), " ").into_owned()
}

pub fn apply_punctuation(text: &str, rule: PunctuationRule) -> String {
    match rule {
        PunctuationRule::Plain => text.to_string(),
        PunctuationRule::French => {
            let text = RE_FR_HIGH.replace_all(text, "");
            let text = RE_FR_OPEN_QUOTE.replace_all(&text, "");
            RE_FR_CLOSE_QUOTE.replace_all(&text, "").into_owned()
        }
        PunctuationRule::Spanish => {
            let text = RE_ES_CLOSE.replace_all(text, "");
            RE_ES_INVERTED.replace_all(&text, "").into_owned()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunking
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum characters per synthesis chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 200;

/// Split `sentence` on whitespace into pieces of at most `max_len` chars.
fn split_words(sentence: &str, max_len: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_len {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Sentences of `paragraph`, each keeping its terminator.
fn sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            // swallow runs like "?!" or "..."
            while let Some(&(_, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    chars.next();
                } else {
                    break;
                }
            }
            let end = chars.peek().map(|&(j, _)| j).unwrap_or(paragraph.len());
            let s = paragraph[start..end].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = end;
        }
    }
    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Split text into synthesis-sized chunks.
///
/// Each non-empty line is a paragraph.  Paragraphs longer than `max_len`
/// characters are split at sentence terminators and sentences re-joined
/// greedily up to `max_len`; a single sentence that is still too long is
/// split between words.
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    for paragraph in text.lines().map(str::trim).filter(|p| !p.is_empty()) {
        if paragraph.chars().count() <= max_len {
            chunks.push(paragraph.to_string());
            continue;
        }
        let mut current = String::new();
        for sentence in sentences(paragraph) {
            let len = sentence.chars().count();
            if len > max_len {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                split_words(sentence, max_len, &mut chunks);
                continue;
            }
            if !current.is_empty() && current.chars().count() + 1 + len > max_len {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }
    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// TextCleaner — full pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Toggles for the cleaning pipeline.
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    pub remove_html: bool,
    pub remove_urls: bool,
    pub remove_emails: bool,
    pub strip_unsupported: bool,
    pub punctuation: bool,
    pub remove_extra_whitespace: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            remove_html: false,
            remove_urls: false,
            remove_emails: false,
            strip_unsupported: true,
            punctuation: true,
            remove_extra_whitespace: true,
        }
    }
}

/// Cleaner bound to one language of the table.
pub struct TextCleaner {
    pub config: CleanerConfig,
    rule: PunctuationRule,
}

impl TextCleaner {
    pub fn new(language: &Language) -> Self {
        Self::with_config(language, CleanerConfig::default())
    }

    pub fn with_config(language: &Language, config: CleanerConfig) -> Self {
        Self { config, rule: language.punctuation }
    }

    /// Clean a single run of text; all whitespace (newlines included) collapses.
    pub fn clean(&self, text: &str) -> String {
        let cfg = &self.config;
        let mut text = text.to_string();

        if cfg.remove_html {
            text = remove_html_tags(&text).into_owned();
        }
        if cfg.remove_urls {
            text = remove_urls(&text).into_owned();
        }
        if cfg.remove_emails {
            text = remove_emails(&text).into_owned();
        }
        if cfg.strip_unsupported {
            text = strip_unsupported(&text);
        }
        if cfg.remove_extra_whitespace {
            text = remove_extra_whitespace(&text);
        }
        if cfg.punctuation {
            text = apply_punctuation(&text, self.rule);
        }

        text
    }

    /// Clean paragraph by paragraph and chunk the result.
    pub fn prepare(&self, text: &str, max_len: usize) -> Vec<String> {
        let cleaned: Vec<String> = text
            .lines()
            .map(|line| self.clean(line))
            .filter(|line| !line.is_empty())
            .collect();
        split_into_chunks(&cleaned.join("\n"), max_len)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
