//! Phonetic encoding for transliteration-style typo detection
//!
//! Input-method typos in Chinese usually keep the pronunciation and change
//! the character (租 → 組, 繳 → 腳). Comparing the toneless pinyin of two
//! questions catches these where character edit distance cannot.

use crate::distance::normalized_similarity;
use pinyin::ToPinyin;

/// Text to phonetic key
pub trait PhoneticEncoder: Send + Sync {
    fn encode(&self, text: &str) -> String;
}

/// Toneless Mandarin pinyin
///
/// Han characters become their primary toneless reading; ASCII letters and
/// digits pass through lowercased; everything else is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinyinEncoder;

impl PhoneticEncoder for PinyinEncoder {
    fn encode(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 2);
        for c in text.chars() {
            if let Some(reading) = c.to_pinyin() {
                out.push_str(reading.plain());
            } else if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            }
        }
        out
    }
}

/// Similarity of the phonetic keys of `a` and `b`
#[must_use]
pub fn phonetic_similarity(encoder: &dyn PhoneticEncoder, a: &str, b: &str) -> f64 {
    normalized_similarity(&encoder.encode(a), &encoder.encode(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homophone_typos_share_a_key() {
        let enc = PinyinEncoder;
        assert_eq!(enc.encode("每月租金幾號要繳"), enc.encode("美月組金幾號藥角"));
        assert!((phonetic_similarity(&enc, "每月租金幾號要繳", "美月組金幾號藥角") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unrelated_questions_diverge() {
        let enc = PinyinEncoder;
        assert!(phonetic_similarity(&enc, "每月租金幾號要繳", "今天天氣如何？") < 0.5);
    }

    #[test]
    fn ascii_passes_through_and_punctuation_drops() {
        assert_eq!(PinyinEncoder.encode("Wi-Fi 密碼?"), "wifimima");
    }
}
