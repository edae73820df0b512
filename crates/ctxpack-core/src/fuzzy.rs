//! Edit-distance matching for typo-tolerant search.

/// Levenshtein distance between two strings, counted in chars.
///
/// Uses two rolling rows sized by the shorter string.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let substitution = prev[j] + usize::from(lc != sc);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

/// Whether `a` and `b` are within `max_distance` edits.
///
/// Strings whose lengths differ by more than `max_distance` are rejected
/// up front; containment either way is accepted without computing the
/// distance.
pub fn fuzzy_match(a: &str, b: &str, max_distance: usize) -> bool {
    let (a_len, b_len) = (a.chars().count(), b.chars().count());
    if a_len.abs_diff(b_len) > max_distance {
        return false;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    levenshtein(a, b) <= max_distance
}
