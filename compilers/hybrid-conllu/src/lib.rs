pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

pub use error::ConlluError;
pub use reader::{read_path, read_str};
pub use writer::{write_path, write_sentence, write_sentences};

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_protocol::TokenId;

    const DOC: &str = "# sent_id = 1\n\
# text = Dogs don't bark.\n\
1\tDogs\tdog\tNOUN\tNNS\t_\t4\tnsubj\t_\t_\n\
2-3\tdon't\t_\t_\t_\t_\t_\t_\t_\t_\n\
2\tdo\tdo\tAUX\tVBP\t_\t4\taux\t_\t_\n\
3\tn't\tnot\tPART\tRB\t_\t4\tadvmod\t_\t_\n\
4\tbark\tbark\tVERB\tVB\t_\t0\troot\t_\tSpaceAfter=No\n\
5\t.\t.\tPUNCT\t.\t_\t4\tpunct\t_\t_\n\
\n\
1\t1984\t_\tNUM\tCD\t_\t0\troot\t_\t_\n";

    #[test]
    fn test_read_document() {
        let sentences = read_str(DOC).unwrap();
        assert_eq!(sentences.len(), 2);

        let first = &sentences[0];
        assert_eq!(first.len(), 5);
        assert_eq!(first.extra.len(), 3);
        assert_eq!(first.extra[2].after, 1);
        assert_eq!(first.words()[3].head, Some(TokenId::ROOT));
        assert_eq!(first.words()[0].norm, "dogs");

        // No trailing blank line, lemma defaults to the lowercased form.
        let second = &sentences[1];
        assert_eq!(second.words()[0].lemma, "1984");
        assert_eq!(second.words()[0].norm, "NUM");
    }

    #[test]
    fn test_write_keeps_pass_through_lines() {
        let sentences = read_str(DOC).unwrap();
        let mut out = Vec::new();
        assert_eq!(write_sentences(&mut out, &sentences).unwrap(), 2);

        // Only the missing lemma differs from the input.
        let expected = DOC.replace("1984\t_\tNUM", "1984\t1984\tNUM");
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", expected));
    }

    #[test]
    fn test_write_prefers_predictions() {
        let mut sentences = read_str(DOC).unwrap();
        let token = sentences[1].get_mut(TokenId(1)).unwrap();
        token.head = None;
        token.relation = None;
        token.pred_head = Some(TokenId::ROOT);
        token.pred_relation = Some("root".to_string());

        let mut out = Vec::new();
        write_sentence(&mut out, &sentences[1]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\t1984\t1984\tNUM\tCD\t_\t0\troot\t_\t_\n\n");
    }

    #[test]
    fn test_bad_heads_are_reported_with_line() {
        let doc = "1\ta\ta\tX\t_\t_\t9\tdep\t_\t_\n\n";
        match read_str(doc) {
            Err(ConlluError::Sentence { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
