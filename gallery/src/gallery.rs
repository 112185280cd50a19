use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A stored face embedding.
///
/// Embeddings are immutable once constructed; the gallery only ever
/// appends or drops whole embeddings.
#[derive(Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Returns the dimensionality of the embedding.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl fmt::Debug for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedding").field("dim", &self.0.len()).finish()
    }
}

/// Mapping from identity name to its enrolled embeddings.
///
/// Identities are kept in lexicographic name order, which is also the
/// order the matcher visits them in. Embeddings within an identity keep
/// their enrollment order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Gallery {
    identities: BTreeMap<String, Vec<Embedding>>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Returns the number of embeddings across all identities.
    pub fn total_embeddings(&self) -> usize {
        self.identities.values().map(Vec::len).sum()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.identities.contains_key(name)
    }

    /// Returns the embeddings enrolled under `name`.
    pub fn get(&self, name: &str) -> Option<&[Embedding]> {
        self.identities.get(name).map(Vec::as_slice)
    }

    /// Returns the number of embeddings enrolled under `name` (0 if absent).
    pub fn count(&self, name: &str) -> usize {
        self.identities.get(name).map_or(0, Vec::len)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.identities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Embedding])> {
        self.identities
            .iter()
            .map(|(name, embs)| (name.as_str(), embs.as_slice()))
    }

    /// Iterates every embedding, identity by identity.
    pub fn embeddings(&self) -> impl Iterator<Item = &Embedding> {
        self.identities.values().flatten()
    }

    /// Appends an embedding to `name`, creating the identity if new.
    /// Returns the identity's embedding count afterwards.
    pub fn push(&mut self, name: &str, emb: Embedding) -> usize {
        let embs = self.identities.entry(name.to_string()).or_default();
        embs.push(emb);
        embs.len()
    }

    /// Replaces the embeddings of an existing identity.
    pub(crate) fn replace(&mut self, name: &str, embs: Vec<Embedding>) {
        if let Some(slot) = self.identities.get_mut(name) {
            *slot = embs;
        }
    }

    pub(crate) fn insert_identity(&mut self, name: String, embs: Vec<Embedding>) {
        self.identities.insert(name, embs);
    }
}
