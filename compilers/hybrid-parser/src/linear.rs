use std::collections::HashMap;
use std::fs;
use std::iter;
use std::path::Path;
use std::rc::Rc;

use hybrid_protocol::Relations;
use hybrid_state::{Focus, Observation};
use rkyv::ser::{serializers::AllocSerializer, Serializer};
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};

use crate::error::ScorerError;
use crate::scorer::{MarginLoss, ScoreTable, Scored, Scorer};

const SHIFT: usize = 0;
const SWAP: usize = 1;

/// Points back at one output of the sparse features active in a state.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearHandle {
    features: Rc<[String]>,
    output: usize,
}

/// Sparse linear model over string features of the observation.
///
/// Each feature owns a row of `2 + 2·|relations|` weights laid out as
/// SHIFT, SWAP, then LEFT-ARC/RIGHT-ARC interleaved per relation.
#[derive(Debug, Clone)]
pub struct LinearScorer {
    relations: Relations,
    learning_rate: f32,
    weights: HashMap<String, Vec<f32>>,
}

/// Archived form of a `LinearScorer`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[archive(check_bytes)]
pub struct ScorerSnapshot {
    pub relations: Relations,
    pub learning_rate: f32,
    pub rows: Vec<FeatureRow>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[archive(check_bytes)]
pub struct FeatureRow {
    pub feature: String,
    pub weights: Vec<f32>,
}

impl LinearScorer {
    pub fn new(relations: Relations) -> Self {
        Self { relations, learning_rate: 1.0, weights: HashMap::new() }
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn width(&self) -> usize {
        2 + 2 * self.relations.len()
    }

    /// Number of features with a weight row.
    pub fn feature_count(&self) -> usize {
        self.weights.len()
    }

    pub fn features(observation: &Observation<'_>) -> Vec<String> {
        let mut out = vec!["bias".to_string()];

        let stack =
            observation.stack.iter().enumerate().map(|(i, f)| (format!("s{}", i), f.as_ref()));
        let buffer = iter::once(("b0".to_string(), observation.buffer.as_ref()));
        for (name, focus) in stack.chain(buffer) {
            match focus {
                None => out.push(format!("{}:empty", name)),
                Some(focus) => push_focus(&mut out, &name, focus),
            }
        }

        let s0 = observation.stack.first().and_then(Option::as_ref);
        out.push(format!("s0p|b0p={}|{}", pos_of(s0), pos_of(observation.buffer.as_ref())));
        out
    }

    pub fn snapshot(&self) -> ScorerSnapshot {
        let mut rows: Vec<FeatureRow> = self
            .weights
            .iter()
            .map(|(feature, weights)| FeatureRow {
                feature: feature.clone(),
                weights: weights.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.feature.cmp(&b.feature));
        ScorerSnapshot {
            relations: self.relations.clone(),
            learning_rate: self.learning_rate,
            rows,
        }
    }

    pub fn from_snapshot(snapshot: ScorerSnapshot) -> Result<Self, ScorerError> {
        let mut scorer = Self::new(snapshot.relations).with_learning_rate(snapshot.learning_rate);
        let expected = scorer.width();
        for row in snapshot.rows {
            if row.weights.len() != expected {
                return Err(ScorerError::Width {
                    feature: row.feature,
                    expected,
                    found: row.weights.len(),
                });
            }
            scorer.weights.insert(row.feature, row.weights);
        }
        Ok(scorer)
    }

    pub fn to_bytes(&self) -> Result<AlignedVec, ScorerError> {
        let mut serializer = AllocSerializer::<4096>::default();
        serializer
            .serialize_value(&self.snapshot())
            .map_err(|e| ScorerError::Archive(format!("{:?}", e)))?;
        Ok(serializer.into_serializer().into_inner())
    }

    /// Validates and loads an archive produced by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ScorerError> {
        let mut aligned = AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        let snapshot = rkyv::from_bytes::<ScorerSnapshot>(&aligned)
            .map_err(|e| ScorerError::Archive(format!("{:?}", e)))?;
        Self::from_snapshot(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScorerError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScorerError> {
        Self::from_bytes(&fs::read(path)?)
    }

    fn adjust(&mut self, handle: &LinearHandle, delta: f32) {
        let width = self.width();
        for feature in handle.features.iter() {
            let row = self.weights.entry(feature.clone()).or_insert_with(|| vec![0.0; width]);
            if let Some(weight) = row.get_mut(handle.output) {
                *weight += delta;
            }
        }
    }
}

fn pos_of<'a>(focus: Option<&'a Focus<'_>>) -> &'a str {
    focus.map_or("-", |f| f.token.pos.as_str())
}

fn push_focus(out: &mut Vec<String>, name: &str, focus: &Focus<'_>) {
    out.push(format!("{}:w={}", name, focus.token.norm));
    out.push(format!("{}:p={}", name, focus.token.pos));
    for (j, slot) in focus.slots.iter().enumerate() {
        out.push(format!("{}.{}:p={}", name, j, slot.pos));
    }
}

impl Scorer for LinearScorer {
    type Handle = LinearHandle;

    fn relations(&self) -> &Relations {
        &self.relations
    }

    fn score(&self, observation: &Observation<'_>) -> ScoreTable<LinearHandle> {
        let features: Rc<[String]> = Self::features(observation).into();
        let mut totals = vec![0.0f32; self.width()];
        for feature in features.iter() {
            if let Some(row) = self.weights.get(feature) {
                for (total, weight) in totals.iter_mut().zip(row) {
                    *total += weight;
                }
            }
        }

        let scored = |output: usize| {
            Scored::new(totals[output], LinearHandle { features: Rc::clone(&features), output })
        };
        let labels = 0..self.relations.len();
        ScoreTable {
            left_arc: labels.clone().map(|j| scored(2 + 2 * j)).collect(),
            right_arc: labels.map(|j| scored(3 + 2 * j)).collect(),
            shift: scored(SHIFT),
            swap: scored(SWAP),
        }
    }

    fn update(&mut self, losses: &[MarginLoss<LinearHandle>]) {
        let rate = self.learning_rate;
        for loss in losses {
            self.adjust(&loss.valid, rate);
            self.adjust(&loss.wrong, -rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_protocol::{ParserConfig, Sentence, Token, TokenId, Transition, TransitionSet};
    use hybrid_state::{Mode, ParseState};

    fn sentence() -> Sentence {
        Sentence::new(vec![
            Token::new(TokenId(1), "Dogs").with_pos("NOUN", "NNS").with_gold(TokenId(2), "nsubj"),
            Token::new(TokenId(2), "bark").with_pos("VERB", "VBP").with_gold(TokenId::ROOT, "root"),
        ])
        .unwrap()
    }

    #[test]
    fn test_features_cover_window() {
        let s = sentence();
        let rels = Relations::new(["nsubj", "root"]);
        let state = ParseState::new(&s, &rels, &ParserConfig::default(), Mode::Predict);
        let features = LinearScorer::features(&state.observe(2));

        assert!(features.contains(&"s0:empty".to_string()));
        assert!(features.contains(&"s1:empty".to_string()));
        assert!(features.contains(&"b0:w=dogs".to_string()));
        assert!(features.contains(&"b0.2:p=NNS".to_string()));
        assert!(features.contains(&"s0p|b0p=-|NNS".to_string()));
    }

    #[test]
    fn test_update_moves_scores_apart() {
        let s = sentence();
        let rels = Relations::new(["nsubj", "root"]);
        let mut scorer = LinearScorer::new(rels.clone()).with_learning_rate(0.5);
        let mut state = ParseState::new(&s, &rels, &ParserConfig::default(), Mode::Predict);
        state.apply(hybrid_protocol::Action::shift()).unwrap();

        let observation = state.observe(3);
        let table = scorer.score(&observation);
        assert_eq!(table.left_arc.len(), rels.len());
        assert_eq!(table.shift.score, 0.0);

        scorer.update(&[MarginLoss {
            wrong: table.shift.handle.clone(),
            valid: table.left_arc[0].handle.clone(),
        }]);
        let table = scorer.score(&observation);
        assert!(table.left_arc[0].score > 0.0);
        assert!(table.shift.score < 0.0);
        assert_eq!(table.swap.score, 0.0);

        let candidates = table.candidates(TransitionSet::LEFT_ARC | TransitionSet::SHIFT);
        assert_eq!(candidates.len(), rels.len() + 1);
        assert_eq!(candidates[0].action.transition, Transition::LeftArc);
    }

    #[test]
    fn test_archive_restores_weights() {
        let s = sentence();
        let rels = Relations::new(["nsubj", "root"]);
        let mut scorer = LinearScorer::new(rels.clone());
        let state = ParseState::new(&s, &rels, &ParserConfig::default(), Mode::Predict);
        let observation = state.observe(3);
        let table = scorer.score(&observation);
        scorer.update(&[MarginLoss {
            wrong: table.swap.handle.clone(),
            valid: table.shift.handle.clone(),
        }]);

        let bytes = scorer.to_bytes().unwrap();
        let restored = LinearScorer::from_bytes(&bytes).unwrap();
        assert_eq!(restored.snapshot(), scorer.snapshot());
        assert_eq!(restored.score(&observation), scorer.score(&observation));
    }

    #[test]
    fn test_snapshot_width_is_checked() {
        let snapshot = ScorerSnapshot {
            relations: Relations::new(["dep"]),
            learning_rate: 1.0,
            rows: vec![FeatureRow { feature: "bias".to_string(), weights: vec![0.0; 3] }],
        };
        assert!(matches!(
            LinearScorer::from_snapshot(snapshot),
            Err(ScorerError::Width { expected: 6, found: 3, .. })
        ));
    }
}
