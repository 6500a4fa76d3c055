use std::fs;
use std::path::Path;

use hybrid_protocol::{normalize, PassThrough, Sentence, Token, TokenId};

use crate::error::ConlluError;
use crate::parser::{parse_line, RawLine, RawWord};

/// Reads every sentence of a CoNLL-U document. A final block without a
/// trailing blank line is still returned.
pub fn read_str(input: &str) -> Result<Vec<Sentence>, ConlluError> {
    let mut sentences = Vec::new();
    let mut block = Block::default();

    for (index, line) in input.lines().enumerate() {
        let number = index + 1;
        match parse_line(line).map_err(|reason| ConlluError::Malformed { line: number, reason })? {
            RawLine::Blank => {
                if let Some(sentence) = block.finish(number)? {
                    sentences.push(sentence);
                }
            }
            RawLine::PassThrough(text) => block.extra.push(PassThrough {
                after: block.words.len() as u32,
                line: text.to_string(),
            }),
            RawLine::Word(word) => block.words.push(to_token(&word)),
        }
    }
    if let Some(sentence) = block.finish(input.lines().count())? {
        sentences.push(sentence);
    }

    tracing::debug!(sentences = sentences.len(), "read CoNLL-U document");
    Ok(sentences)
}

pub fn read_path(path: impl AsRef<Path>) -> Result<Vec<Sentence>, ConlluError> {
    let input = fs::read_to_string(path.as_ref())?;
    read_str(&input)
}

#[derive(Default)]
struct Block {
    words: Vec<Token>,
    extra: Vec<PassThrough>,
}

impl Block {
    /// Turns the collected lines into a sentence and resets the block.
    /// Blocks with comments but no words are dropped.
    fn finish(&mut self, line: usize) -> Result<Option<Sentence>, ConlluError> {
        let words = std::mem::take(&mut self.words);
        let extra = std::mem::take(&mut self.extra);
        if words.is_empty() {
            return Ok(None);
        }
        let mut sentence =
            Sentence::new(words).map_err(|source| ConlluError::Sentence { line, source })?;
        sentence.extra = extra;
        Ok(Some(sentence))
    }
}

fn to_token(word: &RawWord<'_>) -> Token {
    let lemma = if word.lemma == "_" {
        word.form.to_lowercase()
    } else {
        word.lemma.to_string()
    };

    Token {
        id: TokenId(word.id),
        form: word.form.to_string(),
        norm: normalize(word.form),
        lemma,
        cpos: word.upos.to_string(),
        pos: word.xpos.to_string(),
        feats: word.feats.to_string(),
        head: word.head.map(TokenId),
        relation: word.deprel.map(str::to_string),
        deps: word.deps.to_string(),
        misc: word.misc.to_string(),
        pred_head: None,
        pred_relation: None,
    }
}
