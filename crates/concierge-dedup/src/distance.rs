//! Character-level edit distance

/// Levenshtein distance over Unicode scalar values
///
/// Works on `char`s rather than bytes so one CJK substitution costs 1.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// `1 - distance / max_len`; two empty strings are identical
#[must_use]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = levenshtein(a, b) as f64 / max_len as f64;
    1.0 - ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_substitution_costs_one() {
        assert_eq!(levenshtein("每月租金幾號要繳", "每月住金幾號要繳"), 1);
        assert_eq!(levenshtein("每月租金幾號要繳", "每月租金幾號較腳"), 2);
    }

    #[test]
    fn classic_cases() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn similarity_bounds() {
        assert!((normalized_similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(normalized_similarity("abc", "xyz").abs() < f64::EPSILON);
        assert!((normalized_similarity("abcd", "abcx") - 0.75).abs() < 1e-12);
    }
}
