//! Structural detectors that look at the shape of the text rather than its
//! vocabulary.

use super::EmailText;

pub const MAX_SPELLING_MISTAKES: u8 = 3;
pub const MAX_CURRENCY_SYMBOLS: u8 = 3;
pub const MAX_BODY_LENGTH_BUCKET: u8 = 10;

const COMMON_MISSPELLINGS: &[&str] = &[
    "recieved",
    "recieve",
    "acheive",
    "seperate",
    "definately",
    "goverment",
    "occured",
    "occuring",
    "untill",
    "wich",
    "accomodate",
    "acommodate",
    "priviledge",
];

const ATTACHMENT_PHRASES: &[&str] = &[
    "attach",
    "download",
    "open file",
    "click file",
    "view attachment",
];

// Currency in a receipt or statement is expected, not a lure.
const RECEIPT_WORDS: &[&str] = &["receipt", "statement", "total", "summary", "bill"];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£'];

const HTML_TAGS: &[&str] = &["<html", "<body", "<div"];

const SHOUTING_MIN_CHARS: usize = 50;
const SHOUTING_UPPERCASE_RATIO: f64 = 0.3;

/// Number of distinct list entries found. "recieved" also contains "recieve".
pub fn spelling_mistakes(text: &EmailText) -> u8 {
    let found = COMMON_MISSPELLINGS
        .iter()
        .filter(|mistake| text.lower().contains(*mistake))
        .count();
    found.min(MAX_SPELLING_MISTAKES as usize) as u8
}

pub fn excessive_punctuation(text: &EmailText) -> u8 {
    let raw = text.raw();
    if raw.contains("!!!") || raw.contains("???") {
        return 1;
    }

    let len = text.char_len();
    if len > SHOUTING_MIN_CHARS {
        let uppercase = raw.chars().filter(|c| c.is_uppercase()).count();
        if uppercase as f64 / len as f64 > SHOUTING_UPPERCASE_RATIO {
            return 1;
        }
    }
    0
}

pub fn dollar_signs(text: &EmailText) -> u8 {
    let count = text
        .raw()
        .chars()
        .filter(|c| CURRENCY_SYMBOLS.contains(c))
        .count();
    if count == 0 || text.contains_any(RECEIPT_WORDS) {
        return 0;
    }
    count.min(MAX_CURRENCY_SYMBOLS as usize) as u8
}

pub fn attachment_mention(text: &EmailText) -> u8 {
    text.contains_any(ATTACHMENT_PHRASES) as u8
}

/// Length bucket: hundreds of characters, capped.
pub fn body_length(text: &EmailText) -> u8 {
    (text.char_len() / 100).min(MAX_BODY_LENGTH_BUCKET as usize) as u8
}

pub fn has_html(text: &EmailText) -> u8 {
    text.contains_any(HTML_TAGS) as u8
}
