use std::fmt;

use crate::cosine::{cosine_sim, mean};
use crate::gallery::{Embedding, Gallery};

/// Label reported for observations that match no identity.
pub const UNKNOWN: &str = "unknown";

/// Result of matching one query embedding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The matched identity, or `None` when the best score did not clear
    /// the threshold.
    pub name: Option<String>,

    /// Best mean cosine similarity found, even when unmatched.
    /// 0.0 when nothing was comparable.
    pub score: f32,
}

impl Match {
    pub fn unknown(score: f32) -> Self {
        Self { name: None, score }
    }

    /// Returns the identity name, or [`UNKNOWN`].
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn is_known(&self) -> bool {
        self.name.is_some()
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.3})", self.label(), self.score)
    }
}

/// Scores a query against every identity and applies the acceptance
/// threshold.
pub struct Matcher {
    threshold: f32,
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Adjusts matching strictness at runtime.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Returns the identity whose embeddings are, on average, most similar
    /// to `query`.
    ///
    /// Identities are visited in name order and replace the current best
    /// only with a strictly greater score, so the best score never drops
    /// below 0.0 and ties go to the lexicographically smallest name.
    /// The best identity is returned only if its score is strictly greater
    /// than the threshold.
    pub fn identify(&self, gallery: &Gallery, query: Option<&[f32]>) -> Match {
        let Some(query) = query else {
            return Match::unknown(0.0);
        };

        let mut best: Option<&str> = None;
        let mut best_score: f32 = 0.0;
        for (name, embs) in gallery.iter() {
            if let Some(score) = identity_score(embs, query) {
                if score > best_score {
                    best_score = score;
                    best = Some(name);
                }
            }
        }

        match best {
            Some(name) if best_score > self.threshold => Match {
                name: Some(name.to_string()),
                score: best_score,
            },
            _ => Match::unknown(best_score),
        }
    }
}

/// Mean cosine similarity between `query` and each stored embedding of the
/// same length. `None` when no stored embedding is comparable.
pub fn identity_score(embs: &[Embedding], query: &[f32]) -> Option<f32> {
    mean(
        embs.iter()
            .filter(|e| e.dim() == query.len())
            .map(|e| cosine_sim(e.as_slice(), query)),
    )
}
