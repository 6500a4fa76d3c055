use rkyv::{Archive, Deserialize, Serialize};
use crate::error::ProtocolError;
use crate::ids::TokenId;

#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Surface form given to the synthetic root.
pub const ROOT_FORM: &str = "*root*";
/// Relation label carried by the synthetic root.
pub const ROOT_RELATION: &str = "rroot";

/// One word of a sentence, or the synthetic root.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct Token {
    pub id: TokenId,
    pub form: String,
    pub norm: String,
    pub lemma: String,
    pub cpos: String,
    pub pos: String,
    pub feats: String,
    /// Gold head. `None` when the input is unannotated.
    pub head: Option<TokenId>,
    /// Gold relation label.
    pub relation: Option<String>,
    pub deps: String,
    pub misc: String,
    pub pred_head: Option<TokenId>,
    pub pred_relation: Option<String>,
}

impl Token {
    pub fn new(id: TokenId, form: impl Into<String>) -> Self {
        let form = form.into();
        Self {
            id,
            norm: normalize(&form),
            lemma: form.to_lowercase(),
            form,
            cpos: "_".to_string(),
            pos: "_".to_string(),
            feats: "_".to_string(),
            head: None,
            relation: None,
            deps: "_".to_string(),
            misc: "_".to_string(),
            pred_head: None,
            pred_relation: None,
        }
    }

    pub fn root() -> Self {
        let mut root = Self::new(TokenId::ROOT, ROOT_FORM);
        root.lemma = ROOT_FORM.to_string();
        root.cpos = "ROOT-CPOS".to_string();
        root.pos = "ROOT-POS".to_string();
        root.relation = Some(ROOT_RELATION.to_string());
        root
    }

    pub fn with_gold(mut self, head: TokenId, relation: impl Into<String>) -> Self {
        self.head = Some(head);
        self.relation = Some(relation.into());
        self
    }

    pub fn with_pos(mut self, cpos: impl Into<String>, pos: impl Into<String>) -> Self {
        self.cpos = cpos.into();
        self.pos = pos.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }
}

/// Lines of a CoNLL-U block that are not plain word lines (comments,
/// multiword ranges, empty nodes). Kept so writing a sentence back is lossless.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct PassThrough {
    /// Number of word tokens that precede this line in the block.
    pub after: u32,
    pub line: String,
}

/// Root token followed by the real tokens `1..=N` in order.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct Sentence {
    tokens: Vec<Token>,
    pub extra: Vec<PassThrough>,
}

impl Sentence {
    /// Builds a sentence from real tokens, prepending the synthetic root.
    /// Ids must run `1..=N` without gaps.
    pub fn new(words: Vec<Token>) -> Result<Self, ProtocolError> {
        let mut tokens = Vec::with_capacity(words.len() + 1);
        tokens.push(Token::root());
        for (i, word) in words.into_iter().enumerate() {
            let expected = TokenId(i as u32 + 1);
            if word.id != expected {
                return Err(ProtocolError::NonContiguousId { expected, found: word.id });
            }
            tokens.push(word);
        }

        let sentence = Self { tokens, extra: Vec::new() };
        for token in sentence.words() {
            if let Some(head) = token.head {
                if sentence.get(head).is_none() {
                    return Err(ProtocolError::UnknownHead { token: token.id, head });
                }
            }
        }
        Ok(sentence)
    }

    /// Number of real tokens (root excluded).
    pub fn len(&self) -> usize {
        self.tokens.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> &Token {
        &self.tokens[0]
    }

    /// Root followed by all real tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Real tokens only.
    pub fn words(&self) -> &[Token] {
        &self.tokens[1..]
    }

    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id.index())
    }

    pub fn get_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.get_mut(id.index())
    }

    pub fn clear_predictions(&mut self) {
        for token in &mut self.tokens {
            token.pred_head = None;
            token.pred_relation = None;
        }
    }
}

/// Lowercases a form, collapsing anything that starts with a digit run to `NUM`.
pub fn normalize(form: &str) -> String {
    if form.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        "NUM".to_string()
    } else {
        form.to_lowercase()
    }
}
