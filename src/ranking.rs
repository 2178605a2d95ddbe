use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranked<T> {
    pub id: T,
    pub total_score: f64,
    pub position: usize,
}

/// Competition ranking ("1, 1, 3"): highest score first, ties share a
/// position, and the next lower score takes its 1-based index.
///
/// The sort is stable, so tied entries keep their input order. NaN ranks
/// as the lowest possible score.
pub fn rank<T: Clone>(entries: &[(T, f64)]) -> Vec<Ranked<T>> {
    let mut sorted: Vec<&(T, f64)> = entries.iter().collect();
    sorted.sort_by(|a, b| sort_key(b.1).total_cmp(&sort_key(a.1)));

    let mut out: Vec<Ranked<T>> = Vec::with_capacity(sorted.len());
    for (i, (id, score)) in sorted.into_iter().enumerate() {
        let position = match out.last() {
            Some(prev) if sort_key(*score) >= sort_key(prev.total_score) => prev.position,
            _ => i + 1,
        };
        out.push(Ranked {
            id: id.clone(),
            total_score: *score,
            position,
        });
    }
    out
}

fn sort_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(ranked: &[Ranked<&'static str>]) -> Vec<(&'static str, usize)> {
        ranked.iter().map(|r| (r.id, r.position)).collect()
    }

    #[test]
    fn empty_input_ranks_nothing() {
        let ranked: Vec<Ranked<&str>> = rank(&[]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn all_tied_share_first() {
        let ranked = rank(&[("A", 10.0), ("B", 10.0)]);
        assert_eq!(positions(&ranked), vec![("A", 1), ("B", 1)]);
    }

    #[test]
    fn tie_then_gap() {
        let ranked = rank(&[("A", 10.0), ("B", 10.0), ("C", 5.0)]);
        assert_eq!(positions(&ranked), vec![("A", 1), ("B", 1), ("C", 3)]);
    }

    #[test]
    fn unsorted_input_is_ordered_descending() {
        let ranked = rank(&[("low", 12.5), ("top", 88.0), ("mid", 40.0), ("mid2", 40.0)]);
        assert_eq!(
            positions(&ranked),
            vec![("top", 1), ("mid", 2), ("mid2", 2), ("low", 4)]
        );
        assert_eq!(ranked[0].total_score, 88.0);
    }

    #[test]
    fn nan_scores_rank_last_without_panicking() {
        let mut entries: Vec<(String, f64)> = (0..40)
            .map(|i| (format!("s{}", i), f64::from(i % 7)))
            .collect();
        entries[3].1 = f64::NAN;
        entries[21].1 = f64::NAN;

        let ranked = rank(&entries);
        assert_eq!(ranked.len(), 40);
        assert_eq!(ranked[0].total_score, 6.0);
        assert_eq!(ranked[0].position, 1);
        let tail: Vec<&str> = ranked[38..].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(tail, vec!["s3", "s21"]);
        assert_eq!(ranked[38].position, 39);
        assert_eq!(ranked[39].position, 39);
    }
}
