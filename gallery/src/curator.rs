use tracing::debug;

use crate::cosine::{cosine_sim, mean};
use crate::gallery::{Embedding, Gallery};

/// Default number of embeddings kept per identity by pruning.
pub const DEFAULT_KEEP_BEST: usize = 10;

/// Returns, for each embedding, its mean cosine similarity to every other
/// embedding of the same length in `embs`. An embedding with nothing to
/// compare against scores 0.0.
pub fn centrality(embs: &[Embedding]) -> Vec<f32> {
    embs.iter()
        .enumerate()
        .map(|(i, a)| {
            mean(
                embs.iter()
                    .enumerate()
                    .filter(|&(j, b)| j != i && b.dim() == a.dim())
                    .map(|(_, b)| cosine_sim(a.as_slice(), b.as_slice())),
            )
            .unwrap_or(0.0)
        })
        .collect()
}

/// Keeps the `keep_best` most central embeddings, most central first.
/// Equal scores keep their enrollment order.
pub fn most_central(embs: &[Embedding], keep_best: usize) -> Vec<Embedding> {
    let scores = centrality(embs);
    let mut order: Vec<usize> = (0..embs.len()).collect();
    order.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]));
    order.truncate(keep_best);
    order.into_iter().map(|i| embs[i].clone()).collect()
}

/// Trims every identity holding more than `keep_best` embeddings.
/// `keep_best` is raised to 1 so no identity is ever emptied.
/// Returns the number of identities pruned.
pub(crate) fn prune_gallery(gallery: &mut Gallery, keep_best: usize) -> usize {
    let keep_best = keep_best.max(1);
    let oversized: Vec<String> = gallery
        .iter()
        .filter(|(_, embs)| embs.len() > keep_best)
        .map(|(name, _)| name.to_string())
        .collect();

    for name in &oversized {
        let Some(embs) = gallery.get(name) else {
            continue;
        };
        let before = embs.len();
        let kept = most_central(embs, keep_best);
        debug!("gallery: pruned {name:?} from {before} to {} embeddings", kept.len());
        gallery.replace(name, kept);
    }
    oversized.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn single_embedding_has_zero_centrality() {
        assert_eq!(centrality(&[e(&[1.0, 0.0])]), vec![0.0]);
    }

    #[test]
    fn outlier_is_least_central() {
        let embs = vec![
            e(&[1.0, 0.0, 0.0]),
            e(&[0.99, 0.1, 0.0]),
            e(&[0.0, 0.0, 1.0]),
            e(&[0.98, 0.15, 0.0]),
        ];
        let scores = centrality(&embs);
        let outlier = scores[2];
        assert!(scores.iter().enumerate().all(|(i, &s)| i == 2 || s > outlier));

        let kept = most_central(&embs, 3);
        assert_eq!(kept.len(), 3);
        assert!(!kept.contains(&embs[2]));
    }

    #[test]
    fn ties_keep_enrollment_order() {
        let embs = vec![e(&[1.0, 0.0]), e(&[1.0, 0.0]), e(&[1.0, 0.0])];
        let kept = most_central(&embs, 2);
        assert_eq!(kept, vec![embs[0].clone(), embs[1].clone()]);
    }

    #[test]
    fn mismatched_lengths_are_not_compared() {
        let embs = vec![e(&[1.0, 0.0]), e(&[1.0, 0.0]), e(&[1.0, 0.0, 0.0])];
        let scores = centrality(&embs);
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn prune_only_touches_oversized_identities() {
        let mut g = Gallery::new();
        for i in 0..5 {
            g.push("big", e(&[1.0, i as f32 * 0.1]));
        }
        g.push("small", e(&[0.0, 1.0]));
        g.push("small", e(&[0.1, 1.0]));
        let small_before = g.get("small").unwrap().to_vec();

        assert_eq!(prune_gallery(&mut g, 2), 1);
        assert_eq!(g.count("big"), 2);
        assert_eq!(g.get("small").unwrap(), small_before.as_slice());
    }

    #[test]
    fn prune_nothing_when_within_limit() {
        let mut g = Gallery::new();
        g.push("a", e(&[1.0, 0.0]));
        let before = g.clone();
        assert_eq!(prune_gallery(&mut g, 10), 0);
        assert_eq!(g, before);
    }

    #[test]
    fn prune_zero_keeps_one() {
        let mut g = Gallery::new();
        g.push("a", e(&[1.0, 0.0]));
        g.push("a", e(&[0.9, 0.1]));
        assert_eq!(prune_gallery(&mut g, 0), 1);
        assert_eq!(g.count("a"), 1);
    }
}
