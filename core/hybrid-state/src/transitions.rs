use hybrid_protocol::{Action, TokenId, Transition, TransitionSet};

use crate::error::StateError;
use crate::{Mode, ParseState};

impl ParseState<'_> {
    /// Transitions whose preconditions hold in the current configuration.
    pub fn legal(&self) -> TransitionSet {
        let mut set = TransitionSet::empty();
        let depth = self.stack.len();
        let b0 = self.b0();

        if depth > 0 {
            set |= TransitionSet::LEFT_ARC;
            // Attaching to the root while other material is still on the
            // stack would leave several roots behind.
            if self.mode == Mode::Predict && b0 == Some(TokenId::ROOT) && depth > 1 {
                set.remove(TransitionSet::LEFT_ARC);
            }
        }
        if depth > 1 {
            set |= TransitionSet::RIGHT_ARC;
        }
        if let Some(b0) = b0 {
            if !b0.is_root() {
                set |= TransitionSet::SHIFT;
            }
            if let Some(s0) = self.s0() {
                if s0 < b0 {
                    set |= TransitionSet::SWAP;
                }
            }
        }
        set
    }

    /// Legal transitions minus SWAP once the swap budget is spent.
    pub fn candidates(&self) -> TransitionSet {
        let mut set = self.legal();
        if self.swap_budget_exhausted() {
            set.remove(TransitionSet::SWAP);
        }
        set
    }

    /// Applies `action`, recording the predicted arc for LEFT-ARC and RIGHT-ARC.
    pub fn apply(&mut self, action: Action) -> Result<(), StateError> {
        let transition = action.transition;
        if !self.legal().allows(transition) {
            return Err(StateError::IllegalTransition(transition));
        }
        if transition.is_arc() && action.relation.is_none() {
            return Err(StateError::MissingRelation(transition));
        }

        match transition {
            Transition::Shift => {
                let front =
                    self.buffer.pop_front().ok_or(StateError::IllegalTransition(transition))?;
                self.stack.push(front);
            }
            Transition::Swap => {
                let child = self.stack.pop().ok_or(StateError::IllegalTransition(transition))?;
                self.buffer.insert(1, child);
                self.swaps += 1;
            }
            Transition::LeftArc => {
                let child = self.stack.pop().ok_or(StateError::IllegalTransition(transition))?;
                let parent = self.b0().ok_or(StateError::IllegalTransition(transition))?;
                self.attach(child, parent, action)?;
            }
            Transition::RightArc => {
                let child = self.stack.pop().ok_or(StateError::IllegalTransition(transition))?;
                let parent = self.s0().ok_or(StateError::IllegalTransition(transition))?;
                self.attach(child, parent, action)?;
            }
        }

        self.steps += 1;
        Ok(())
    }

    fn attach(
        &mut self,
        child: TokenId,
        parent: TokenId,
        action: Action,
    ) -> Result<(), StateError> {
        let side = self.policy.head_offset
            + match action.transition {
                Transition::LeftArc => 0,
                _ => 1,
            };

        let child_node = self.node_mut(child).ok_or(StateError::UnknownToken(child))?;
        child_node.pred_head = Some(parent);
        child_node.pred_relation = action.relation;
        let descendant = child_node.slots.get(side).copied();

        let policy = self.policy;
        let parent_node = self.node_mut(parent).ok_or(StateError::UnknownToken(parent))?;
        if let Some(slot) = parent_node.slots.get_mut(side) {
            if policy.descendant {
                if let Some(descendant) = descendant {
                    *slot = descendant;
                }
            }
            if policy.child {
                *slot = child;
            }
        }
        Ok(())
    }
}
