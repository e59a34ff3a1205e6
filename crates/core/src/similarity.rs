//! Edit-distance helpers used to offer "did you mean" corrections.

/// Levenshtein distance over chars, case-insensitive.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` of `target`, excluding exact
/// matches. Ties go to the lexicographically smallest candidate.
pub fn closest_match<'a, I>(target: &str, candidates: I, max_distance: usize) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &'a str)> = None;
    for candidate in candidates {
        if candidate == target {
            continue;
        }
        let d = edit_distance(target, candidate);
        if d > max_distance {
            continue;
        }
        let better = match best {
            None => true,
            Some((bd, bc)) => d < bd || (d == bd && candidate < bc),
        };
        if better {
            best = Some((d, candidate));
        }
    }
    best.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_basics() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("integer", "interger"), 1);
        assert_eq!(edit_distance("Text", "text"), 0);
    }

    #[test]
    fn closest_prefers_smaller_distance_then_alphabetical() {
        let lists = ["fruit", "fruits_x", "fruity"];
        assert_eq!(closest_match("fruits", lists, 2), Some("fruit"));
        assert_eq!(closest_match("veg", lists, 2), None);
        assert_eq!(closest_match("ab", ["ac", "aa"], 1), Some("aa"));
    }

    #[test]
    fn exact_match_is_not_a_suggestion() {
        assert_eq!(closest_match("text", ["text"], 2), None);
    }
}
