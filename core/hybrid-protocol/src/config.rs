use crate::error::ConfigError;

#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Knobs shared by training and prediction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserConfig {
    /// Follow the gold path only instead of exploring with the dynamic oracle.
    pub use_static_oracle_instead_of_dynamic: bool,
    /// Give each token a slot holding its own representation.
    pub use_head_representation: bool,
    /// On attachment, fill the parent's left/right slot with the child itself.
    pub use_leftmost_rightmost_child: bool,
    /// On attachment, fill the parent's left/right slot with the child's
    /// same-side slot (deepest descendant on that side).
    pub use_leftmost_rightmost_descendant: bool,
    /// Number of stack elements that feed the scorer.
    pub stack_window_k: usize,
    /// SWAP budget per sentence, as a multiple of the sentence length.
    pub swap_budget_multiplier: usize,
    /// Margin terms accumulated before the scorer is updated.
    pub error_batch: usize,
    /// Seed for shuffling and exploration.
    pub seed: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            use_static_oracle_instead_of_dynamic: false,
            use_head_representation: true,
            use_leftmost_rightmost_child: true,
            use_leftmost_rightmost_descendant: false,
            stack_window_k: 3,
            swap_budget_multiplier: 2,
            error_batch: 50,
            seed: 1,
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.use_head_representation
            || self.use_leftmost_rightmost_child
            || self.use_leftmost_rightmost_descendant)
        {
            return Err(ConfigError::NoRepresentation);
        }
        if self.stack_window_k == 0 {
            return Err(ConfigError::EmptyStackWindow);
        }
        Ok(())
    }

    pub fn uses_dynamic_oracle(&self) -> bool {
        !self.use_static_oracle_instead_of_dynamic
    }

    /// True when tokens carry left/right dependent slots.
    pub fn uses_dependent_slots(&self) -> bool {
        self.use_leftmost_rightmost_child || self.use_leftmost_rightmost_descendant
    }

    /// Representation slots per token: optional head slot, then left and right.
    pub fn slot_count(&self) -> usize {
        usize::from(self.use_head_representation) + if self.uses_dependent_slots() { 2 } else { 0 }
    }

    /// Offset of the left-dependent slot.
    pub fn head_offset(&self) -> usize {
        usize::from(self.use_head_representation)
    }

    pub fn swap_budget(&self, sentence_len: usize) -> usize {
        self.swap_budget_multiplier * sentence_len
    }
}
