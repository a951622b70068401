//! Splits raw console input into tokens. Whitespace separates tokens except
//! inside a double-quoted span; `\"` is a literal quote and never opens or
//! closes a span.

/// The output of [`tokenize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tokenized {
    pub tokens: Vec<String>,
    /// `false` if a quoted span is still open at the end of the input. A
    /// submitted command rejects it, completion tolerates it.
    pub well_formed: bool,
}

impl Tokenized {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Strips unescaped quotes and the backslashes escaping a quote from `chunk`.
/// Returns the stripped text and the number of unescaped quotes seen.
fn strip_quotes(chunk: &str) -> (String, usize) {
    let mut buf = String::with_capacity(chunk.len());
    let mut quotes = 0;
    let mut iter = chunk.chars().peekable();
    loop {
        let current = iter.next();
        let next = iter.peek().cloned();
        match (current, next) {
            (Some('\\'), Some('"')) => {
                // Escaped quote: keep the quote, drop the backslash.
                iter.next();
                buf.push('"');
            }
            (Some('"'), _) => {
                quotes += 1;
            }
            (Some(ch), _) => {
                buf.push(ch);
            }
            (None, _) => break,
        }
    }

    (buf, quotes)
}

/// Tokenizes `raw`. Interior whitespace of a quoted span collapses into a
/// single space.
pub fn tokenize(raw: &str) -> Tokenized {
    let mut tokens = Vec::new();
    // The pieces of a quoted span which is not closed yet.
    let mut open_span: Option<String> = None;

    for chunk in raw.split_whitespace() {
        let (stripped, quotes) = strip_quotes(chunk);
        let toggles = quotes % 2 == 1;
        open_span = match (open_span, toggles) {
            (None, false) => {
                tokens.push(stripped);
                None
            }
            (None, true) => Some(stripped),
            (Some(mut span), false) => {
                span.push(' ');
                span.push_str(&stripped);
                Some(span)
            }
            (Some(mut span), true) => {
                span.push(' ');
                span.push_str(&stripped);
                tokens.push(span);
                None
            }
        };
    }

    let well_formed = open_span.is_none();
    if let Some(span) = open_span {
        tokens.push(span);
    }

    Tokenized {
        tokens,
        well_formed,
    }
}

/// Returns `true` if the user has finished the last token, i.e. `raw` ends
/// with whitespace outside of a quoted span.
pub fn ends_with_separator(raw: &str, tokenized: &Tokenized) -> bool {
    tokenized.well_formed && raw.ends_with(|ch: char| ch.is_whitespace())
}

/// Wraps `s` in double quotes if it contains whitespace so that it survives
/// [`tokenize`] as a single token.
pub fn quote_if_needed(s: &str) -> String {
    if s.contains(|ch: char| ch.is_whitespace()) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(raw: &str) -> Vec<String> {
        tokenize(raw).tokens
    }

    #[test]
    fn whitespace() {
        assert_eq!(tokens(""), Vec::<String>::new());
        assert_eq!(tokens("   "), Vec::<String>::new());
        assert_eq!(tokens("a b\tc"), vec!["a", "b", "c"]);
        assert_eq!(tokens("  a    b  "), vec!["a", "b"]);
    }

    #[test]
    fn quoted_spans() {
        assert_eq!(tokens("a \"b c\" d"), vec!["a", "b c", "d"]);
        assert_eq!(tokens("\"one two three\""), vec!["one two three"]);
        assert_eq!(tokens("\"single\""), vec!["single"]);
        assert_eq!(tokens("-p=\"a b\" x"), vec!["-p=a b", "x"]);
        assert_eq!(tokens("\"a   b\""), vec!["a b"]);
        assert!(tokenize("a \"b c\" d").well_formed);
    }

    #[test]
    fn escaped_quotes() {
        let result = tokenize("a \\\"b");
        assert_eq!(result.tokens, vec!["a", "\"b"]);
        assert!(result.well_formed);

        assert_eq!(tokens("\"say \\\"hi\\\" now\""), vec!["say \"hi\" now"]);
    }

    #[test]
    fn unterminated() {
        let result = tokenize("a \"b c");
        assert_eq!(result.tokens, vec!["a", "b c"]);
        assert!(!result.well_formed);

        let result = tokenize("\"");
        assert_eq!(result.tokens, vec![""]);
        assert!(!result.well_formed);
    }

    #[test]
    fn separators() {
        let raw = "bigdoors ";
        assert!(ends_with_separator(raw, &tokenize(raw)));
        let raw = "bigdoors";
        assert!(!ends_with_separator(raw, &tokenize(raw)));
        let raw = "bigdoors \"a ";
        assert!(!ends_with_separator(raw, &tokenize(raw)));
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_if_needed("plain"), "plain");
        assert_eq!(quote_if_needed("two words"), "\"two words\"");
        assert_eq!(tokens(&quote_if_needed("two words")), vec!["two words"]);
    }
}
