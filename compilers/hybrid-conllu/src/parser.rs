use nom::{
    branch::alt,
    bytes::complete::take_till,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, recognize},
    sequence::{preceded, tuple},
    IResult,
};

/// The ten columns of a word line, borrowed from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWord<'a> {
    pub id: u32,
    pub form: &'a str,
    pub lemma: &'a str,
    pub upos: &'a str,
    pub xpos: &'a str,
    pub feats: &'a str,
    pub head: Option<u32>,
    pub deprel: Option<&'a str>,
    pub deps: &'a str,
    pub misc: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawLine<'a> {
    Word(RawWord<'a>),
    /// Comments, multiword ranges (`3-4`) and empty nodes (`5.1`).
    PassThrough(&'a str),
    /// Sentence separator.
    Blank,
}

fn field(input: &str) -> IResult<&str, &str> {
    take_till(|c| c == '\t')(input)
}

fn next_field(input: &str) -> IResult<&str, &str> {
    preceded(char('\t'), field)(input)
}

fn word_id(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(input)
}

/// `3-4` or `5.1`, followed by a tab.
fn special_id(input: &str) -> IResult<&str, &str> {
    recognize(tuple((digit1, alt((char('-'), char('.'))), digit1, char('\t'))))(input)
}

fn word_line(input: &str) -> IResult<&str, RawWord<'_>> {
    let (input, id) = word_id(input)?;
    let (input, (form, lemma, upos, xpos, feats, head, deprel, deps, misc)) =
        all_consuming(tuple((
            next_field, next_field, next_field, next_field, next_field, next_field, next_field,
            next_field, next_field,
        )))(input)?;

    let head = match head {
        "_" => None,
        digits => Some(
            digits
                .parse::<u32>()
                .map_err(|_| {
                    nom::Err::Error(nom::error::Error::new(digits, nom::error::ErrorKind::Digit))
                })?,
        ),
    };
    let deprel = if deprel == "_" { None } else { Some(deprel) };

    Ok((input, RawWord { id, form, lemma, upos, xpos, feats, head, deprel, deps, misc }))
}

/// Classifies one line (without its trailing newline).
pub fn parse_line(line: &str) -> Result<RawLine<'_>, String> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(RawLine::Blank);
    }
    if line.starts_with('#') || special_id(line).is_ok() {
        return Ok(RawLine::PassThrough(line));
    }

    match word_line(line) {
        Ok((_, word)) => Ok(RawLine::Word(word)),
        Err(_) => {
            let columns = line.split('\t').count();
            if columns != 10 {
                Err(format!("expected 10 tab-separated columns, found {}", columns))
            } else {
                Err(format!("unreadable word line '{}'", line))
            }
        }
    }
}
