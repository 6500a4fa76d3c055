use std::collections::BTreeSet;
use hybrid_protocol::{RelationId, TokenId};

/// Per-token parse record. Gold fields are copied in once; everything else
/// is mutated by transitions and by the oracle's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: TokenId,
    /// Gold head, if the sentence is annotated.
    pub head: Option<TokenId>,
    /// Gold relation mapped into the scorer's vocabulary.
    pub relation: Option<RelationId>,
    /// Position in the in-order traversal of the gold tree.
    pub projective_order: usize,
    /// Gold children not yet resolved.
    pub rdeps: BTreeSet<TokenId>,
    pub pred_head: Option<TokenId>,
    pub pred_relation: Option<RelationId>,
    /// Ids of the tokens whose representation fills each feature slot:
    /// optional head slot, then left-dependent and right-dependent slots.
    pub slots: Vec<TokenId>,
}

impl Node {
    pub fn new(id: TokenId, slot_count: usize) -> Self {
        Self {
            id,
            head: None,
            relation: None,
            projective_order: id.index(),
            rdeps: BTreeSet::new(),
            pred_head: None,
            pred_relation: None,
            slots: vec![id; slot_count],
        }
    }

    pub fn is_attached(&self) -> bool {
        self.pred_head.is_some()
    }
}
