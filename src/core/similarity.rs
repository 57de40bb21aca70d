/// Similarity above which two card names count as the same card
///
/// Loose on purpose: it accepts suffix noise such as "Charizard" vs "Charizard EX",
/// which is also where most false positives come from.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.70;

/// Lowercase and trim a card name for comparison
#[inline]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalized edit-distance similarity in [0, 1]
///
/// `(max_len - levenshtein(a, b)) / max_len`, measured in characters on the
/// normalized names. Returns 0 when either name is empty.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let max_len = a.chars().count().max(b.chars().count()) as f64;
    let distance = strsim::levenshtein(&a, &b) as f64;

    (max_len - distance) / max_len
}

/// Same-card test with an explicit threshold
#[inline]
pub fn names_match_with_threshold(a: &str, b: &str, threshold: f64) -> bool {
    let a_norm = normalize_name(a);
    let b_norm = normalize_name(b);

    if a_norm.is_empty() || b_norm.is_empty() {
        return false;
    }
    if a_norm == b_norm {
        return true;
    }

    name_similarity(&a_norm, &b_norm) > threshold
}

/// Same-card test at the default threshold
#[inline]
pub fn names_match(a: &str, b: &str) -> bool {
    names_match_with_threshold(a, b, DEFAULT_SIMILARITY_THRESHOLD)
}
