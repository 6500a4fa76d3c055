use rkyv::{Archive, Deserialize, Serialize};
use std::collections::HashMap;
use crate::ids::RelationId;
use crate::model::Sentence;

#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Label given to gold relations missing from the vocabulary.
pub const UNKNOWN_RELATION: &str = "runk";

/// Ordered dependency label vocabulary.
///
/// The scorer emits one LEFT-ARC and one RIGHT-ARC score per entry, in this order.
/// `runk` is always present so out-of-vocabulary gold labels still have a target.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct Relations {
    labels: Vec<String>,
}

impl Relations {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !out.contains(&label) {
                out.push(label);
            }
        }
        if !out.iter().any(|l| l == UNKNOWN_RELATION) {
            out.push(UNKNOWN_RELATION.to_string());
        }
        Self { labels: out }
    }

    /// Collects gold labels by descending frequency, keeping at most `max` of them.
    /// Ties keep first-seen order so the vocabulary is reproducible.
    pub fn collect<'a, I>(sentences: I, max: usize) -> Self
    where
        I: IntoIterator<Item = &'a Sentence>,
    {
        let mut counts: HashMap<&'a str, (usize, usize)> = HashMap::new();
        for sentence in sentences {
            for token in sentence.words() {
                if let Some(rel) = token.relation.as_deref() {
                    let next = counts.len();
                    counts.entry(rel).or_insert((0, next)).0 += 1;
                }
            }
        }
        let mut ranked: Vec<(&str, usize, usize)> =
            counts.into_iter().map(|(rel, (n, first))| (rel, n, first)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.truncate(max);
        Self::new(ranked.into_iter().map(|(rel, _, _)| rel))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<RelationId> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| RelationId(i as u32))
    }

    /// Maps a gold label into the vocabulary, falling back to `runk`.
    pub fn id_or_unknown(&self, label: &str) -> RelationId {
        self.get(label)
            .or_else(|| self.get(UNKNOWN_RELATION))
            .unwrap_or(RelationId(0))
    }

    pub fn label(&self, id: RelationId) -> Option<&str> {
        self.labels.get(id.index()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RelationId, &str)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (RelationId(i as u32), l.as_str()))
    }
}
