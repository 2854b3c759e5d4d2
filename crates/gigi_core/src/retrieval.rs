pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, aa, bb), (x, y)| {
            (d + (x * y), aa + (x * x), bb + (y * y))
        });

    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Picks the highest score. On exact ties the earliest candidate wins, so
/// the result follows the iteration order of the input. NaN never wins.
pub fn best_scoring<T, I>(scored: I) -> Option<(T, f32)>
where
    I: IntoIterator<Item = (T, f32)>,
{
    let mut best: Option<(T, f32)> = None;

    for (candidate, score) in scored {
        if score.is_nan() {
            continue;
        }
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((candidate, score)),
        }
    }

    best
}

/// A score is accepted only when strictly above the threshold.
pub fn clears(score: f32, threshold: f32) -> bool {
    score > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_works_for_unit_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_zero_for_mismatched_or_empty_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_ignores_magnitude() {
        let s = cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]);
        assert!((s - 1.0).abs() < 1e-6);
        let opposite = cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]);
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    #[test]
    fn best_scoring_selects_highest() {
        let best = best_scoring(vec![("a", 0.2), ("b", 0.9), ("c", 0.5)]);
        assert_eq!(best, Some(("b", 0.9)));
    }

    #[test]
    fn best_scoring_keeps_first_on_ties() {
        let best = best_scoring(vec![("a", 0.1), ("b", 0.8), ("c", 0.8)]);
        assert_eq!(best, Some(("b", 0.8)));
    }

    #[test]
    fn best_scoring_skips_nan_and_handles_empty() {
        assert_eq!(best_scoring(Vec::<(&str, f32)>::new()), None);
        let best = best_scoring(vec![("nan", f32::NAN), ("x", -0.5)]);
        assert_eq!(best, Some(("x", -0.5)));
    }

    #[test]
    fn clears_is_strict() {
        assert!(!clears(0.7, 0.7));
        assert!(clears(0.7001, 0.7));
        assert!(!clears(0.2, 0.7));
    }
}
