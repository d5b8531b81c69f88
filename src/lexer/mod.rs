use logos::Logos;

/// Tokens of a single pipeline segment.
///
/// Pipe splitting happens before lexing, so `|` never reaches this lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"\s+")]
pub enum Token<'s> {
    // Redirects
    #[token("<")]
    RedirectIn,

    #[token(">")]
    RedirectOut,

    #[token(">>")]
    AppendRedirect,

    // A double-quoted run keeps its whitespace. An unterminated quote
    // swallows the rest of the segment.
    #[regex(r#""[^"]*"?"#, unquote)]
    Quoted(&'s str),

    // Bare words stop at whitespace and redirect characters
    #[regex(r#"[^\s<>"][^\s<>]*"#, |lex| lex.slice())]
    Word(&'s str),
}

fn unquote<'s>(lex: &mut logos::Lexer<'s, Token<'s>>) -> &'s str {
    let inner = &lex.slice()[1..];
    inner.strip_suffix('"').unwrap_or(inner)
}

impl<'s> Token<'s> {
    /// Returns the text carried by a word-like token.
    pub fn text(&self) -> Option<&'s str> {
        match *self {
            Token::Quoted(s) | Token::Word(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            Token::RedirectIn | Token::RedirectOut | Token::AppendRedirect
        )
    }
}

pub struct Lexer<'a> {
    inner: logos::Lexer<'a, Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: Token::lexer(input),
        }
    }

    pub fn tokenize(input: &'a str) -> Result<Vec<Token<'a>>, LexerError> {
        Lexer::new(input).collect()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|result| {
            result.map_err(|_| LexerError::InvalidToken {
                position: self.inner.span().start,
                text: self.inner.slice().to_string(),
            })
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexerError {
    #[error("invalid token at position {position}: '{text}'")]
    InvalidToken { position: usize, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words<'s>(tokens: &[Token<'s>]) -> Vec<&'s str> {
        tokens.iter().filter_map(Token::text).collect()
    }

    #[test]
    fn test_basic_command() {
        let tokens = Lexer::tokenize("ls -la /home").unwrap();
        assert_eq!(words(&tokens), vec!["ls", "-la", "/home"]);
    }

    #[test]
    fn test_quoted_string_keeps_spaces() {
        let tokens = Lexer::tokenize(r#"echo "hello   world" x"#).unwrap();
        assert_eq!(tokens[1], Token::Quoted("hello   world"));
        assert_eq!(words(&tokens), vec!["echo", "hello   world", "x"]);
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        let tokens = Lexer::tokenize(r#"echo "a b"#).unwrap();
        assert_eq!(tokens[1], Token::Quoted("a b"));
    }

    #[test]
    fn test_redirects_split_from_words() {
        let tokens = Lexer::tokenize("sort<in.txt>>out.txt").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("sort"),
                Token::RedirectIn,
                Token::Word("in.txt"),
                Token::AppendRedirect,
                Token::Word("out.txt"),
            ]
        );
    }

    #[test]
    fn test_truncate_redirect() {
        let tokens = Lexer::tokenize("echo hi > f").unwrap();
        assert_eq!(tokens[2], Token::RedirectOut);
        assert!(tokens[2].is_redirect());
    }

    #[test]
    fn test_embedded_quote_stays_in_word() {
        let tokens = Lexer::tokenize(r#"a"b c""#).unwrap();
        assert_eq!(words(&tokens), vec![r#"a"b"#, r#"c""#]);
    }
}
