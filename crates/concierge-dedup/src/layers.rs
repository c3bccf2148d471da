//! Ordered duplicate-detection layers
//!
//! Each layer is a pure predicate over a probe and one candidate. The scan is
//! layer-major: every candidate is tried against layer 1 before any is tried
//! against layer 2, and the first layer with a hit decides the match.

use crate::distance::levenshtein;
use crate::phonetic::{phonetic_similarity, PhoneticEncoder};
use concierge_model::Embedding;
use serde::{Deserialize, Serialize};

/// Detection layer, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLayer {
    Exact,
    EditDistance,
    /// Semantic similarity or small edit distance
    Combined,
    /// Mid-range semantic similarity confirmed by pronunciation
    Phonetic,
}

impl MatchLayer {
    pub const ORDER: [Self; 4] = [Self::Exact, Self::EditDistance, Self::Combined, Self::Phonetic];

    /// Layers that need embeddings
    #[inline]
    #[must_use]
    pub const fn is_semantic(self) -> bool {
        matches!(self, Self::Combined | Self::Phonetic)
    }
}

/// Layer thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerThresholds {
    pub max_edit_distance: usize,
    pub semantic: f64,
    /// Lower bound of the semantic band checked by the phonetic layer
    pub phonetic_semantic_floor: f64,
    pub phonetic: f64,
}

impl Default for LayerThresholds {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            semantic: 0.80,
            phonetic_semantic_floor: 0.60,
            phonetic: 0.80,
        }
    }
}

/// Normalised text plus optional embedding
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    pub text: &'a str,
    pub embedding: Option<&'a Embedding>,
}

/// Why a pair matched
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub layer: MatchLayer,
    pub edit_distance: usize,
    pub semantic: Option<f64>,
    pub phonetic: Option<f64>,
}

fn semantic(a: &Probe<'_>, b: &Probe<'_>) -> Option<f64> {
    Some(a.embedding?.cosine(b.embedding?))
}

/// Layer 1
#[must_use]
pub fn exact(probe: &Probe<'_>, candidate: &Probe<'_>) -> Option<Evidence> {
    (probe.text == candidate.text).then_some(Evidence {
        layer: MatchLayer::Exact,
        edit_distance: 0,
        semantic: None,
        phonetic: None,
    })
}

/// Layer 2
#[must_use]
pub fn edit_distance(
    probe: &Probe<'_>,
    candidate: &Probe<'_>,
    thresholds: &LayerThresholds,
) -> Option<Evidence> {
    let distance = levenshtein(probe.text, candidate.text);
    (distance <= thresholds.max_edit_distance).then_some(Evidence {
        layer: MatchLayer::EditDistance,
        edit_distance: distance,
        semantic: None,
        phonetic: None,
    })
}

/// Layer 3
#[must_use]
pub fn combined(
    probe: &Probe<'_>,
    candidate: &Probe<'_>,
    thresholds: &LayerThresholds,
) -> Option<Evidence> {
    let distance = levenshtein(probe.text, candidate.text);
    let sim = semantic(probe, candidate);
    let hit = sim.is_some_and(|s| s >= thresholds.semantic) || distance <= thresholds.max_edit_distance;
    hit.then_some(Evidence {
        layer: MatchLayer::Combined,
        edit_distance: distance,
        semantic: sim,
        phonetic: None,
    })
}

/// Layer 4
#[must_use]
pub fn phonetic(
    probe: &Probe<'_>,
    candidate: &Probe<'_>,
    thresholds: &LayerThresholds,
    encoder: &dyn PhoneticEncoder,
) -> Option<Evidence> {
    let sim = semantic(probe, candidate)?;
    if !(thresholds.phonetic_semantic_floor..thresholds.semantic).contains(&sim) {
        return None;
    }
    let sound = phonetic_similarity(encoder, probe.text, candidate.text);
    (sound >= thresholds.phonetic).then(|| Evidence {
        layer: MatchLayer::Phonetic,
        edit_distance: levenshtein(probe.text, candidate.text),
        semantic: Some(sim),
        phonetic: Some(sound),
    })
}

fn evaluate(
    layer: MatchLayer,
    probe: &Probe<'_>,
    candidate: &Probe<'_>,
    thresholds: &LayerThresholds,
    encoder: &dyn PhoneticEncoder,
) -> Option<Evidence> {
    match layer {
        MatchLayer::Exact => exact(probe, candidate),
        MatchLayer::EditDistance => edit_distance(probe, candidate, thresholds),
        MatchLayer::Combined => combined(probe, candidate, thresholds),
        MatchLayer::Phonetic => phonetic(probe, candidate, thresholds, encoder),
    }
}

/// Higher is better within one layer
fn strength(e: &Evidence) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let closeness = -(e.edit_distance as f64);
    match e.layer {
        MatchLayer::Exact | MatchLayer::EditDistance => (closeness, 0.0),
        MatchLayer::Combined => (e.semantic.unwrap_or(f64::NEG_INFINITY), closeness),
        MatchLayer::Phonetic => (e.phonetic.unwrap_or(0.0), e.semantic.unwrap_or(0.0)),
    }
}

/// Scan candidates layer by layer
///
/// Returns the index of the strongest candidate in the first layer that has
/// any hit; earlier candidates win exact ties. Semantic layers are skipped
/// when the probe has no embedding.
#[must_use]
pub fn find_match(
    probe: &Probe<'_>,
    candidates: &[Probe<'_>],
    thresholds: &LayerThresholds,
    encoder: &dyn PhoneticEncoder,
) -> Option<(usize, Evidence)> {
    for layer in MatchLayer::ORDER {
        if layer.is_semantic() && probe.embedding.is_none() {
            break;
        }

        let mut best: Option<(usize, Evidence)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let Some(evidence) = evaluate(layer, probe, candidate, thresholds, encoder) else {
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |(_, current)| strength(&evidence) > strength(current));
            if better {
                best = Some((idx, evidence));
            }
        }

        if best.is_some() {
            return best;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phonetic::PinyinEncoder;

    fn probe<'a>(text: &'a str, embedding: Option<&'a Embedding>) -> Probe<'a> {
        Probe { text, embedding }
    }

    #[test]
    fn exact_layer_wins_over_later_layers() {
        let thresholds = LayerThresholds::default();
        let e = Embedding::new(vec![1.0, 0.0]);
        let candidates = [probe("每月住金幾號要繳", Some(&e)), probe("每月租金幾號要繳", Some(&e))];
        let (idx, evidence) =
            find_match(&probe("每月租金幾號要繳", Some(&e)), &candidates, &thresholds, &PinyinEncoder).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(evidence.layer, MatchLayer::Exact);
    }

    #[test]
    fn edit_layer_prefers_smallest_distance() {
        let thresholds = LayerThresholds::default();
        let candidates = [probe("abcxy", None), probe("abcdx", None)];
        let (idx, evidence) = find_match(&probe("abcde", None), &candidates, &thresholds, &PinyinEncoder).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(evidence.edit_distance, 1);
    }

    #[test]
    fn combined_layer_catches_paraphrase() {
        let thresholds = LayerThresholds::default();
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.9, 0.1]);
        let evidence = combined(
            &probe("房租什麼時候交", Some(&a)),
            &probe("每月租金幾號要繳", Some(&b)),
            &thresholds,
        )
        .unwrap();
        assert!(evidence.semantic.unwrap() >= 0.8);
    }

    #[test]
    fn phonetic_layer_requires_mid_band_semantic() {
        let thresholds = LayerThresholds::default();
        let original = Embedding::new(vec![1.0, 0.0]);
        let mid = Embedding::new(vec![0.7, 0.714]);
        let low = Embedding::new(vec![0.5, 0.866]);

        let hit = phonetic(
            &probe("美月組金幾號藥角", Some(&mid)),
            &probe("每月租金幾號要繳", Some(&original)),
            &thresholds,
            &PinyinEncoder,
        );
        assert_eq!(hit.map(|e| e.layer), Some(MatchLayer::Phonetic));

        let miss = phonetic(
            &probe("美月組金幾號藥角", Some(&low)),
            &probe("每月租金幾號要繳", Some(&original)),
            &thresholds,
            &PinyinEncoder,
        );
        assert!(miss.is_none());
    }

    #[test]
    fn no_embedding_limits_scan_to_lexical_layers() {
        let thresholds = LayerThresholds::default();
        let e = Embedding::new(vec![1.0, 0.0]);
        let candidates = [probe("完全不同的句子", Some(&e))];
        assert!(find_match(&probe("另一個問題在這", None), &candidates, &thresholds, &PinyinEncoder).is_none());
    }

    #[test]
    fn unrelated_question_never_matches() {
        let thresholds = LayerThresholds::default();
        let rent = Embedding::new(vec![1.0, 0.0, 0.0]);
        let weather = Embedding::new(vec![0.0, 0.0, 1.0]);
        let candidates = [probe("每月租金幾號要繳", Some(&rent))];
        assert!(find_match(&probe("今天天氣如何?", Some(&weather)), &candidates, &thresholds, &PinyinEncoder).is_none());
    }
}
