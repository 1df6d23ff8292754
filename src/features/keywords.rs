//! Keyword detectors: urgency, greetings, threats, brand misspellings and
//! requests for personal data.

use super::EmailText;

const URGENT_WORDS: &[&str] = &[
    "urgent",
    "immediately",
    "asap",
    "warning",
    "important",
    "alert",
    "attention",
    "critical",
    "deadline",
    "expires",
    "suspended",
    "locked",
    "limited",
    "restricted",
    "blocked",
    "verify now",
    "act now",
    "click here",
    "do it now",
];

const GENERIC_GREETINGS: &[&str] = &[
    "dear customer",
    "dear user",
    "dear member",
    "dear client",
    "valued customer",
    "valued member",
    "hello customer",
    "hello user",
    "greetings",
    "to whom it may concern",
];

const THREAT_WORDS: &[&str] = &[
    "suspend",
    "terminate",
    "close",
    "delete",
    "remove",
    "cancel",
    "block",
    "restrict",
    "disable",
    "deactivate",
    "legal action",
    "lawsuit",
];

/// A threat only counts when it is aimed at an account or access.
const THREAT_TARGETS: &[&str] = &["account", "access"];

// Lowercase only: variants whose lowercase form is the real brand name
// ("appIe", "googIe") would flag every legitimate mention.
const BRAND_MISSPELLINGS: &[&str] = &[
    "paypai",
    "paypall",
    "pay-pal",
    "amaz0n",
    "amazom",
    "amazn",
    "ama-zon",
    "appple",
    "aple",
    "micros0ft",
    "micr0soft",
    "micro-soft",
    "gooogle",
    "g00gle",
    "faceb00k",
    "face-book",
    "facebo0k",
];

const SENSITIVE_DATA_TERMS: &[&str] = &[
    "ssn",
    "social security",
    "credit card number",
    "cvv",
    "pin",
    "password",
    "passcode",
    "bank account number",
    "routing number",
    "mother's maiden name",
    "driver's license",
];

const ASKING_PHRASES: &[&str] = &[
    "enter your",
    "provide your",
    "send us your",
    "confirm your",
    "verify your",
];

pub fn urgent_words(text: &EmailText) -> u8 {
    text.contains_any(URGENT_WORDS) as u8
}

pub fn generic_greeting(text: &EmailText) -> u8 {
    text.contains_any(GENERIC_GREETINGS) as u8
}

pub fn threat_words(text: &EmailText) -> u8 {
    (text.contains_any(THREAT_WORDS) && text.contains_any(THREAT_TARGETS)) as u8
}

pub fn misspelled_domain(text: &EmailText) -> u8 {
    text.contains_any(BRAND_MISSPELLINGS) as u8
}

/// Both a sensitive term and an asking phrase must appear, anywhere in the text.
pub fn personal_info_request(text: &EmailText) -> u8 {
    (text.contains_any(SENSITIVE_DATA_TERMS) && text.contains_any(ASKING_PHRASES)) as u8
}
