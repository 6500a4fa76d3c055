use rkyv::{Archive, Deserialize, Serialize};
use crate::ids::RelationId;

#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use bitflags::bitflags;

/// The four arc-hybrid moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
#[repr(u8)]
pub enum Transition {
    /// Pop s0 and attach it to b0.
    LeftArc = 0,
    /// Pop s0 and attach it to s1.
    RightArc = 1,
    /// Move b0 onto the stack.
    Shift = 2,
    /// Pop s0 and reinsert it just behind b0.
    Swap = 3,
}

impl Transition {
    /// Candidate enumeration order. Ties between equal scores go to the earlier entry.
    pub const ALL: [Transition; 4] = [
        Transition::LeftArc,
        Transition::RightArc,
        Transition::Shift,
        Transition::Swap,
    ];

    pub const fn is_arc(self) -> bool {
        matches!(self, Transition::LeftArc | Transition::RightArc)
    }

    pub const fn flag(self) -> TransitionSet {
        match self {
            Transition::LeftArc => TransitionSet::LEFT_ARC,
            Transition::RightArc => TransitionSet::RIGHT_ARC,
            Transition::Shift => TransitionSet::SHIFT,
            Transition::Swap => TransitionSet::SWAP,
        }
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Transition::LeftArc => "LEFT-ARC",
            Transition::RightArc => "RIGHT-ARC",
            Transition::Shift => "SHIFT",
            Transition::Swap => "SWAP",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// A set of transitions, e.g. the ones legal in a given state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
    pub struct TransitionSet: u8 {
        const LEFT_ARC = 1;
        const RIGHT_ARC = 2;
        const SHIFT = 4;
        const SWAP = 8;
    }
}

impl TransitionSet {
    pub fn allows(self, transition: Transition) -> bool {
        self.contains(transition.flag())
    }

    /// Members in candidate enumeration order.
    pub fn transitions(self) -> impl Iterator<Item = Transition> {
        Transition::ALL.into_iter().filter(move |t| self.allows(*t))
    }
}

/// A transition together with its label (arcs only) and the score it was chosen with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub transition: Transition,
    pub relation: Option<RelationId>,
    pub score: f32,
}

impl Action {
    pub fn new(transition: Transition, relation: Option<RelationId>, score: f32) -> Self {
        Self { transition, relation, score }
    }

    pub fn shift() -> Self {
        Self::new(Transition::Shift, None, 0.0)
    }

    pub fn swap() -> Self {
        Self::new(Transition::Swap, None, 0.0)
    }

    pub fn left_arc(relation: RelationId) -> Self {
        Self::new(Transition::LeftArc, Some(relation), 0.0)
    }

    pub fn right_arc(relation: RelationId) -> Self {
        Self::new(Transition::RightArc, Some(relation), 0.0)
    }
}
