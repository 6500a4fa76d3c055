pub mod cost;
pub mod error;
pub mod graph;

pub use cost::{commit, costs, Costs, ShiftCase};
pub use error::OracleError;
pub use graph::{is_projective, GoldTree};

use hybrid_protocol::Sentence;
use hybrid_state::ParseState;

/// Checks that the gold annotation forms a tree rooted at `0`.
pub fn validate(sentence: &Sentence) -> Result<(), OracleError> {
    GoldTree::from_sentence(sentence).map(|_| ())
}

/// Pre-parsing pass: stores each token's projective order and its full set of
/// gold dependents on the state. Runs once per sentence, before the first transition.
pub fn prepare(state: &mut ParseState<'_>) -> Result<(), OracleError> {
    let tree = GoldTree::from_sentence(state.sentence())?;
    let order = tree.projective_order();

    for (index, position) in order.into_iter().enumerate() {
        let id = hybrid_protocol::TokenId(index as u32);
        let children = tree.children(id);
        if let Some(node) = state.node_mut(id) {
            node.projective_order = position;
            node.rdeps = children.into_iter().collect();
        }
    }
    Ok(())
}
