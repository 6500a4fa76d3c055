use hybrid_protocol::{TokenId, Transition, TransitionSet};
use hybrid_state::ParseState;

/// How a zero-or-more cost SHIFT was justified, remembered so the matching
/// bookkeeping can run once the action is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftCase {
    /// SHIFT is not a candidate.
    Unavailable,
    /// A later token precedes b0 in projective order; b0 has to move out of the way.
    Reorder,
    /// Ordinary shift; committing it drops dependencies that become unreachable.
    Blocking,
}

/// Number of gold arcs that become unreachable by taking each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Costs {
    pub left_arc: usize,
    pub right_arc: usize,
    pub shift: usize,
    pub swap: usize,
    pub shift_case: ShiftCase,
}

impl Costs {
    pub fn of(&self, transition: Transition) -> usize {
        match transition {
            Transition::LeftArc => self.left_arc,
            Transition::RightArc => self.right_arc,
            Transition::Shift => self.shift,
            Transition::Swap => self.swap,
        }
    }

    pub fn is_free(&self, transition: Transition) -> bool {
        self.of(transition) == 0
    }

    /// A free SWAP overrides every other consideration.
    pub fn swap_forced(&self) -> bool {
        self.swap == 0
    }
}

/// Computes the cost of every transition in the current state. Anything
/// outside `candidates` costs 1.
pub fn costs(state: &ParseState<'_>, candidates: TransitionSet) -> Costs {
    let s0 = state.s0();
    let b0 = state.b0();

    let mut left_arc = match (candidates.allows(Transition::LeftArc), s0, b0) {
        (true, Some(s0), Some(b0)) => arc_cost(state, s0, b0),
        _ => 1,
    };

    let mut right_arc = match (candidates.allows(Transition::RightArc), s0, state.s1()) {
        (true, Some(s0), Some(s1)) => arc_cost(state, s0, s1),
        _ => 1,
    };

    let (mut shift, shift_case) = match (candidates.allows(Transition::Shift), b0) {
        (true, Some(b0)) => shift_cost(state, b0),
        _ => (1, ShiftCase::Unavailable),
    };

    let swap = match (candidates.allows(Transition::Swap), s0, b0) {
        (true, Some(s0), Some(b0)) if order(state, s0) > order(state, b0) => {
            left_arc = 1;
            right_arc = 1;
            shift = 1;
            0
        }
        _ => 1,
    };

    Costs { left_arc, right_arc, shift, swap, shift_case }
}

/// Cost of attaching `s0` to `parent` now.
fn arc_cost(state: &ParseState<'_>, s0: TokenId, parent: TokenId) -> usize {
    let Some(node) = state.node(s0) else {
        return 1;
    };
    node.rdeps.len() + usize::from(node.head != Some(parent) && is_pending(state, s0))
}

fn shift_cost(state: &ParseState<'_>, b0: TokenId) -> (usize, ShiftCase) {
    let b0_order = order(state, b0);
    if state.beta().any(|t| order(state, t) < b0_order && t > b0) {
        return (0, ShiftCase::Reorder);
    }

    let Some(node) = state.node(b0) else {
        return (1, ShiftCase::Blocking);
    };
    let stranded = node.rdeps.iter().filter(|d| state.stack().contains(d)).count();
    let head_below = !state.stack().is_empty()
        && node.head.map_or(false, |h| state.stack_below_top().contains(&h))
        && is_pending(state, b0);

    (stranded + usize::from(head_below), ShiftCase::Blocking)
}

/// `id` is still listed among its gold head's remaining dependents.
fn is_pending(state: &ParseState<'_>, id: TokenId) -> bool {
    state
        .node(id)
        .and_then(|n| n.head)
        .and_then(|h| state.node(h))
        .map_or(false, |head| head.rdeps.contains(&id))
}

fn order(state: &ParseState<'_>, id: TokenId) -> usize {
    state.node(id).map_or(id.index(), |n| n.projective_order)
}

/// Updates the remaining-dependent bookkeeping for `transition`. Must run
/// before the transition is applied to `state`.
pub fn commit(state: &mut ParseState<'_>, transition: Transition, shift_case: ShiftCase) {
    match transition {
        Transition::Shift if shift_case == ShiftCase::Blocking => {
            let Some(b0) = state.b0() else { return };
            let head = state.node(b0).and_then(|n| n.head);
            let below: Vec<TokenId> = state.stack_below_top().to_vec();
            let stack: Vec<TokenId> = state.stack().to_vec();

            if let Some(head) = head {
                if below.contains(&head) {
                    if let Some(head_node) = state.node_mut(head) {
                        head_node.rdeps.remove(&b0);
                    }
                }
            }
            if let Some(node) = state.node_mut(b0) {
                node.rdeps.retain(|d| !stack.contains(d));
            }
        }
        Transition::LeftArc | Transition::RightArc => {
            let Some(s0) = state.s0() else { return };
            let head = match state.node_mut(s0) {
                Some(node) => {
                    node.rdeps.clear();
                    node.head
                }
                None => None,
            };
            if let Some(head_node) = head.and_then(|h| state.node_mut(h)) {
                head_node.rdeps.remove(&s0);
            }
        }
        Transition::Shift | Transition::Swap => {}
    }
}
