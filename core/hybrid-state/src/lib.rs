pub mod error;
pub mod node;
pub mod observe;
pub mod transitions;

use std::collections::VecDeque;

use hybrid_protocol::{ParserConfig, Relations, Sentence, Token, TokenId};

pub use error::StateError;
pub use node::Node;
pub use observe::{Focus, Observation};

/// Training relaxes the root restriction on LEFT-ARC; prediction enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Predict,
}

/// Which representation updates an arc triggers on its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotPolicy {
    head_offset: usize,
    child: bool,
    descendant: bool,
}

/// Stack, buffer and per-token records for one sentence.
///
/// Tokens live in an arena indexed by id; the stack and buffer only hold ids.
/// The sentence itself is borrowed read-only and never written to.
#[derive(Debug, Clone)]
pub struct ParseState<'s> {
    sentence: &'s Sentence,
    nodes: Vec<Node>,
    stack: Vec<TokenId>,
    buffer: VecDeque<TokenId>,
    mode: Mode,
    policy: SlotPolicy,
    swaps: usize,
    swap_budget: usize,
    steps: usize,
}

impl<'s> ParseState<'s> {
    /// Initial configuration: empty stack, real tokens in order with the root last.
    pub fn new(
        sentence: &'s Sentence,
        relations: &Relations,
        config: &ParserConfig,
        mode: Mode,
    ) -> Self {
        let slot_count = config.slot_count();
        let nodes = sentence
            .tokens()
            .iter()
            .map(|token| {
                let mut node = Node::new(token.id, slot_count);
                node.head = token.head;
                node.relation = token.relation.as_deref().map(|r| relations.id_or_unknown(r));
                node
            })
            .collect();

        let mut buffer: VecDeque<TokenId> = sentence.words().iter().map(|t| t.id).collect();
        buffer.push_back(TokenId::ROOT);

        Self {
            sentence,
            nodes,
            stack: Vec::new(),
            buffer,
            mode,
            policy: SlotPolicy {
                head_offset: config.head_offset(),
                child: config.use_leftmost_rightmost_child,
                descendant: config.use_leftmost_rightmost_descendant,
            },
            swaps: 0,
            swap_budget: config.swap_budget(sentence.len()),
            steps: 0,
        }
    }

    pub fn sentence(&self) -> &'s Sentence {
        self.sentence
    }

    /// Buffer holds only the root and the stack is empty.
    pub fn is_terminal(&self) -> bool {
        self.stack.is_empty() && self.buffer.len() == 1
    }

    pub fn stack(&self) -> &[TokenId] {
        &self.stack
    }

    pub fn buffer(&self) -> &VecDeque<TokenId> {
        &self.buffer
    }

    /// Top of the stack.
    pub fn s0(&self) -> Option<TokenId> {
        self.stack.last().copied()
    }

    /// Second element of the stack.
    pub fn s1(&self) -> Option<TokenId> {
        self.stack.len().checked_sub(2).map(|i| self.stack[i])
    }

    /// Front of the buffer.
    pub fn b0(&self) -> Option<TokenId> {
        self.buffer.front().copied()
    }

    /// Buffer without its front.
    pub fn beta(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.buffer.iter().skip(1).copied()
    }

    /// Stack without its top.
    pub fn stack_below_top(&self) -> &[TokenId] {
        &self.stack[..self.stack.len().saturating_sub(1)]
    }

    pub fn node(&self, id: TokenId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: TokenId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn token(&self, id: TokenId) -> Option<&'s Token> {
        self.sentence.get(id)
    }

    pub fn swaps(&self) -> usize {
        self.swaps
    }

    pub fn swap_budget(&self) -> usize {
        self.swap_budget
    }

    pub fn swap_budget_exhausted(&self) -> bool {
        self.swaps >= self.swap_budget
    }

    /// Transitions applied so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Upper bound on the number of transitions any derivation can take.
    pub fn step_bound(&self) -> usize {
        2 * self.swap_budget + 2 * self.sentence.len()
    }

    /// Copies predicted heads and labels onto `out`, which should be a copy of
    /// the sentence this state was built from.
    pub fn write_predictions(&self, out: &mut Sentence, relations: &Relations) {
        for node in self.nodes.iter().skip(1) {
            if let Some(token) = out.get_mut(node.id) {
                token.pred_head = node.pred_head;
                token.pred_relation = node
                    .pred_relation
                    .and_then(|r| relations.label(r))
                    .map(str::to_string);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_protocol::{Action, RelationId, Transition, TransitionSet};
    use proptest::prelude::*;

    fn sentence(n: u32) -> Sentence {
        let words = (1..=n)
            .map(|i| Token::new(TokenId(i), format!("w{}", i)))
            .collect();
        Sentence::new(words).unwrap()
    }

    fn relations() -> Relations {
        Relations::new(["dep"])
    }

    #[test]
    fn test_initial_state() {
        let s = sentence(3);
        let state = ParseState::new(&s, &relations(), &ParserConfig::default(), Mode::Predict);

        assert!(state.stack().is_empty());
        let buffer: Vec<u32> = state.buffer().iter().map(|t| t.0).collect();
        assert_eq!(buffer, vec![1, 2, 3, 0]);
        assert!(!state.is_terminal());
        assert_eq!(state.swap_budget(), 6);
        assert_eq!(state.legal(), TransitionSet::SHIFT);
    }

    #[test]
    fn test_empty_sentence_is_terminal() {
        let s = sentence(0);
        let state = ParseState::new(&s, &relations(), &ParserConfig::default(), Mode::Train);
        assert!(state.is_terminal());
        assert!(state.legal().is_empty());
    }

    #[test]
    fn test_swap_reinserts_behind_front() {
        let s = sentence(3);
        let mut state = ParseState::new(&s, &relations(), &ParserConfig::default(), Mode::Train);
        state.apply(Action::shift()).unwrap();
        assert!(state.legal().allows(Transition::Swap));

        state.apply(Action::swap()).unwrap();
        let buffer: Vec<u32> = state.buffer().iter().map(|t| t.0).collect();
        assert_eq!(buffer, vec![2, 1, 3, 0]);
        assert_eq!(state.swaps(), 1);

        // 2 on the stack, 1 at the front: ids are no longer increasing.
        state.apply(Action::shift()).unwrap();
        assert!(!state.legal().allows(Transition::Swap));
    }

    #[test]
    fn test_root_left_arc_restricted_at_prediction() {
        let s = sentence(2);
        let rel = RelationId(0);
        for (mode, expected) in [(Mode::Train, true), (Mode::Predict, false)] {
            let mut state = ParseState::new(&s, &relations(), &ParserConfig::default(), mode);
            state.apply(Action::shift()).unwrap();
            state.apply(Action::shift()).unwrap();
            assert_eq!(state.b0(), Some(TokenId::ROOT));
            assert_eq!(state.legal().allows(Transition::LeftArc), expected);
            assert!(state.legal().allows(Transition::RightArc));

            state.apply(Action::right_arc(rel)).unwrap();
            // A single element may always go to the root.
            assert!(state.legal().allows(Transition::LeftArc));
        }
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let s = sentence(2);
        let mut state = ParseState::new(&s, &relations(), &ParserConfig::default(), Mode::Predict);
        assert_eq!(
            state.apply(Action::left_arc(RelationId(0))),
            Err(StateError::IllegalTransition(Transition::LeftArc))
        );
        state.apply(Action::shift()).unwrap();
        assert_eq!(
            state.apply(Action::new(Transition::LeftArc, None, 0.0)),
            Err(StateError::MissingRelation(Transition::LeftArc))
        );
        assert_eq!(state.steps(), 1);
    }

    #[test]
    fn test_arc_updates_slots() {
        // "a b c": shift a, left-arc a -> b, shift b, shift c, right-arc c -> b
        let s = sentence(3);
        let rel = RelationId(0);

        let mut config = ParserConfig::default();
        config.use_leftmost_rightmost_child = false;
        config.use_leftmost_rightmost_descendant = true;

        let mut state = ParseState::new(&s, &relations(), &config, Mode::Train);
        state.apply(Action::shift()).unwrap();
        state.apply(Action::left_arc(rel)).unwrap();
        state.apply(Action::shift()).unwrap();
        state.apply(Action::shift()).unwrap();
        state.apply(Action::right_arc(rel)).unwrap();

        let b = state.node(TokenId(2)).unwrap();
        // head slot, left slot, right slot
        assert_eq!(b.slots, vec![TokenId(2), TokenId(1), TokenId(3)]);
        assert_eq!(state.node(TokenId(1)).unwrap().pred_head, Some(TokenId(2)));
        assert_eq!(state.node(TokenId(3)).unwrap().pred_head, Some(TokenId(2)));

        state.apply(Action::left_arc(rel)).unwrap();
        assert!(state.is_terminal());
        // Descendant mode propagates b's left slot (a) up to the root.
        assert_eq!(
            state.node(TokenId::ROOT).unwrap().slots,
            vec![TokenId(0), TokenId(1), TokenId(0)]
        );
    }

    #[test]
    fn test_child_slot_wins_over_descendant() {
        let s = sentence(2);
        let rel = RelationId(0);
        let mut config = ParserConfig::default();
        config.use_leftmost_rightmost_descendant = true;

        let mut state = ParseState::new(&s, &relations(), &config, Mode::Train);
        state.apply(Action::shift()).unwrap();
        state.apply(Action::left_arc(rel)).unwrap();
        state.apply(Action::shift()).unwrap();
        state.apply(Action::left_arc(rel)).unwrap();
        assert_eq!(
            state.node(TokenId::ROOT).unwrap().slots,
            vec![TokenId(0), TokenId(2), TokenId(0)]
        );
    }

    #[test]
    fn test_write_predictions() {
        let s = sentence(1);
        let rels = relations();
        let mut state = ParseState::new(&s, &rels, &ParserConfig::default(), Mode::Predict);
        state.apply(Action::shift()).unwrap();
        state.apply(Action::left_arc(rels.get("dep").unwrap())).unwrap();

        let mut out = s.clone();
        state.write_predictions(&mut out, &rels);
        assert_eq!(out.words()[0].pred_head, Some(TokenId::ROOT));
        assert_eq!(out.words()[0].pred_relation.as_deref(), Some("dep"));
        assert_eq!(s.words()[0].pred_head, None);
    }

    proptest! {
        #[test]
        fn test_random_derivations_terminate(
            n in 0u32..12,
            choices in proptest::collection::vec(any::<u8>(), 1..64),
            train in any::<bool>(),
        ) {
            let s = sentence(n);
            let rels = relations();
            let mode = if train { Mode::Train } else { Mode::Predict };
            let mut state = ParseState::new(&s, &rels, &ParserConfig::default(), mode);

            let mut i = 0;
            while !state.is_terminal() {
                let options: Vec<Transition> = state.candidates().transitions().collect();
                prop_assert!(!options.is_empty());
                let t = options[choices[i % choices.len()] as usize % options.len()];
                let rel = if t.is_arc() { Some(RelationId(0)) } else { None };
                state.apply(Action::new(t, rel, 0.0)).unwrap();
                i += 1;

                // Every token is in exactly one of stack, buffer, attached.
                for node in state.nodes() {
                    let places = usize::from(state.stack().contains(&node.id))
                        + usize::from(state.buffer().contains(&node.id))
                        + usize::from(node.is_attached());
                    prop_assert_eq!(places, 1);
                }
                prop_assert!(state.steps() <= state.step_bound());
            }

            prop_assert!(state.swaps() <= state.swap_budget());
            prop_assert_eq!(state.buffer().len(), 1);
            for node in state.nodes().iter().skip(1) {
                prop_assert!(node.pred_head.is_some());
                prop_assert!(node.pred_relation.is_some());
            }
        }
    }
}
