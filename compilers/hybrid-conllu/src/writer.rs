use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use hybrid_protocol::{Sentence, Token};

/// Writes one sentence followed by a blank line. Predicted heads and labels
/// replace the gold columns when present.
pub fn write_sentence<W: Write>(out: &mut W, sentence: &Sentence) -> io::Result<()> {
    let mut extra = sentence.extra.iter().peekable();
    for (count, token) in sentence.words().iter().enumerate() {
        while let Some(line) = extra.next_if(|e| e.after as usize <= count) {
            writeln!(out, "{}", line.line)?;
        }
        writeln!(out, "{}", format_token(token))?;
    }
    for line in extra {
        writeln!(out, "{}", line.line)?;
    }
    writeln!(out)
}

pub fn write_sentences<'a, W, I>(out: &mut W, sentences: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Sentence>,
{
    let mut written = 0;
    for sentence in sentences {
        write_sentence(out, sentence)?;
        written += 1;
    }
    Ok(written)
}

pub fn write_path<'a, I>(path: impl AsRef<Path>, sentences: I) -> io::Result<usize>
where
    I: IntoIterator<Item = &'a Sentence>,
{
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    let written = write_sentences(&mut out, sentences)?;
    out.flush()?;
    Ok(written)
}

fn format_token(token: &Token) -> String {
    let head = token
        .pred_head
        .or(token.head)
        .map_or_else(|| "_".to_string(), |h| h.to_string());
    let relation = token
        .pred_relation
        .as_deref()
        .or(token.relation.as_deref())
        .unwrap_or("_");

    [
        token.id.to_string().as_str(),
        &token.form,
        &token.lemma,
        &token.cpos,
        &token.pos,
        &token.feats,
        &head,
        relation,
        &token.deps,
        &token.misc,
    ]
    .join("\t")
}
