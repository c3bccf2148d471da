//! Form field validation
//!
//! Values may arrive embedded in a sentence ("我的電話是 0912-345-678"), so the
//! structured kinds extract the first well-formed value before validating it.

use concierge_model::{FieldKind, FormField};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

static MOBILE: Lazy<Regex> = Lazy::new(|| compile(r"(?:^|\D)(09\d{8})(?:\D|$)"));
static LANDLINE: Lazy<Regex> = Lazy::new(|| compile(r"(?:^|\D)(0\d-\d{7,8})(?:\D|$)"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| compile(r"([A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})"));
static TAIWAN_ID: Lazy<Regex> =
    Lazy::new(|| compile(r"(?:^|[^A-Z0-9])([A-Z][12]\d{8})(?:\D|$)"));
static NUMBER: Lazy<Regex> = Lazy::new(|| compile(r"(-?\d+(?:\.\d+)?)"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static validator pattern")
}

/// Why a value was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FieldRejection {
    Required,
    TooShort { min: usize },
    TooLong { max: usize },
    InvalidNumber,
    InvalidPhone,
    InvalidEmail,
    InvalidTaiwanId,
}

impl Display for FieldRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("此欄位為必填"),
            Self::TooShort { min } => write!(f, "長度至少需要 {min} 個字"),
            Self::TooLong { max } => write!(f, "長度不可超過 {max} 個字"),
            Self::InvalidNumber => f.write_str("請輸入數字"),
            Self::InvalidPhone => f.write_str("電話格式不正確，請輸入手機 09xxxxxxxx 或市話 0x-xxxxxxx"),
            Self::InvalidEmail => f.write_str("電子郵件格式不正確"),
            Self::InvalidTaiwanId => f.write_str("身分證字號格式不正確"),
        }
    }
}

/// Validate `raw` for `field`, returning the value to store
///
/// Blank input on a required field is `Required`; blank input on an optional
/// field is accepted as an empty value.
///
/// # Errors
/// The first rule the value breaks
pub fn validate_field(field: &FormField, raw: &str) -> Result<String, FieldRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return if field.required {
            Err(FieldRejection::Required)
        } else {
            Ok(String::new())
        };
    }

    let value = match field.kind {
        FieldKind::Text => trimmed.to_string(),
        FieldKind::Number => capture(&NUMBER, trimmed).ok_or(FieldRejection::InvalidNumber)?,
        FieldKind::Phone => extract_phone(trimmed).ok_or(FieldRejection::InvalidPhone)?,
        FieldKind::Email => capture(&EMAIL, trimmed).ok_or(FieldRejection::InvalidEmail)?,
        FieldKind::TaiwanId => {
            let id = capture(&TAIWAN_ID, &trimmed.to_ascii_uppercase())
                .ok_or(FieldRejection::InvalidTaiwanId)?;
            if !taiwan_id_checksum(&id) {
                return Err(FieldRejection::InvalidTaiwanId);
            }
            id
        }
    };

    let len = value.chars().count();
    if let Some(min) = field.min_length {
        if len < min {
            return Err(FieldRejection::TooShort { min });
        }
    }
    if let Some(max) = field.max_length {
        if len > max {
            return Err(FieldRejection::TooLong { max });
        }
    }
    Ok(value)
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_phone(text: &str) -> Option<String> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')'))
        .collect();
    if let Some(landline) = capture(&LANDLINE, &compact) {
        return Some(landline);
    }
    let digits_only: String = compact.chars().filter(|c| *c != '-').collect();
    capture(&MOBILE, &digits_only)
}

/// Taiwan national id checksum
///
/// The leading letter expands to two digits; with weights
/// `[1, 9, 8, 7, 6, 5, 4, 3, 2, 1, 1]` the weighted sum must be divisible by 10.
#[must_use]
pub fn taiwan_id_checksum(id: &str) -> bool {
    const WEIGHTS: [u32; 11] = [1, 9, 8, 7, 6, 5, 4, 3, 2, 1, 1];

    let mut chars = id.chars();
    let Some(letter) = chars.next() else {
        return false;
    };
    let Some(code) = letter_code(letter) else {
        return false;
    };

    let mut digits = vec![code / 10, code % 10];
    for c in chars {
        match c.to_digit(10) {
            Some(d) => digits.push(d),
            None => return false,
        }
    }
    if digits.len() != WEIGHTS.len() {
        return false;
    }

    let sum: u32 = digits.iter().zip(WEIGHTS).map(|(d, w)| d * w).sum();
    sum % 10 == 0
}

fn letter_code(letter: char) -> Option<u32> {
    let code = match letter {
        'A' => 10,
        'B' => 11,
        'C' => 12,
        'D' => 13,
        'E' => 14,
        'F' => 15,
        'G' => 16,
        'H' => 17,
        'I' => 34,
        'J' => 18,
        'K' => 19,
        'L' => 20,
        'M' => 21,
        'N' => 22,
        'O' => 35,
        'P' => 23,
        'Q' => 24,
        'R' => 25,
        'S' => 26,
        'T' => 27,
        'U' => 28,
        'V' => 29,
        'W' => 32,
        'X' => 30,
        'Y' => 31,
        'Z' => 33,
        _ => return None,
    };
    Some(code)
}
