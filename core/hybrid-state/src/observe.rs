use hybrid_protocol::{Token, TokenId, TransitionSet};

use crate::ParseState;

/// One stack or buffer position as the scorer sees it.
#[derive(Debug, Clone)]
pub struct Focus<'a> {
    pub token: &'a Token,
    /// Tokens filling this position's representation slots.
    pub slots: Vec<&'a Token>,
}

/// What the scorer gets to look at: the top `k` stack elements (top first)
/// and the buffer front. Absent positions are `None`.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub stack: Vec<Option<Focus<'a>>>,
    pub buffer: Option<Focus<'a>>,
    pub candidates: TransitionSet,
}

impl<'s> ParseState<'s> {
    pub fn observe(&self, k: usize) -> Observation<'s> {
        let stack = (0..k)
            .map(|i| {
                self.stack
                    .len()
                    .checked_sub(i + 1)
                    .and_then(|pos| self.focus(self.stack[pos]))
            })
            .collect();

        Observation {
            stack,
            buffer: self.b0().and_then(|id| self.focus(id)),
            candidates: self.candidates(),
        }
    }

    fn focus(&self, id: TokenId) -> Option<Focus<'s>> {
        let token = self.token(id)?;
        let slots = self
            .node(id)?
            .slots
            .iter()
            .filter_map(|slot| self.token(*slot))
            .collect();
        Some(Focus { token, slots })
    }
}
