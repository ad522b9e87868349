/// #Notes
/// `+` and `-` could be operators or the starts of numbers (`-.1`). This lexer
///  does not attempt to distinguish: they always become Plus and Minus tokens.
///  The parser should use its increased context to disambiguate these usages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenType {
    ParenLeft,
    ParenRight,
    Comma,
    Plus,
    Minus,
    Asterisk,
    ForwardSlash,
    Percent,
    Ampersand, // & is string concatenation
    Equals,    // = or ==
    NotEquals, // != or <>
    LT,        // <
    GT,        // >
    LTE,       // <=
    GTE,       // >=
    And,       // &&
    Or,        // ||
    Bang,      // !
    Number,
    Identifier,
    /// `{Column Name}`: lets column names carry spaces and punctuation
    CurlyIdentifier,
    True,
    False,
    Null,
    StringSingleQuote,
    StringDoubleQuote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,

    // Byte indexes into the source
    start: usize,
    end: usize,
}

impl Token {
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Unterminated string literal starting at {0}")]
    UnterminatedStringLiteral(usize),
    #[error("Unterminated column reference starting at {0}")]
    UnterminatedCurlyIdentifier(usize),
    #[error("Unexpected character at {0}")]
    UnexpectedCharacter(usize),
}

/// This type simply holds a reference to the source bytes and an index, so it's
///  cheap to copy, making lookahead/rewind operations in the parser very easy.
#[derive(Clone)]
pub struct Lexer<'input> {
    source: &'input [u8],
    current: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(source: &'input [u8]) -> Self {
        Self { source, current: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current >= self.source.len()
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.source.get(self.current).copied()
    }

    /// If current starts with [prefix], consume it and return true.
    pub fn consume1(&mut self, prefix: u8) -> bool {
        if let Some(c) = self.peek()
            && c == prefix
        {
            self.current += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    fn consume_while(&mut self, predicate: impl Fn(u8) -> bool) {
        while let Some(c) = self.peek()
            && predicate(c)
        {
            self.current += 1;
        }
    }

    #[inline]
    fn consume_whitespace(&mut self) {
        self.consume_while(|b| b.is_ascii_whitespace());
    }

    fn consume_number(&mut self) {
        // Start with zero or more digits
        self.consume_while(|b| b.is_ascii_digit());

        // Optional fraction
        if let Some(b'.') = self.peek() {
            self.current += 1;
            self.consume_while(|b| b.is_ascii_digit());
        }

        // Optional exponent, only taken when digits actually follow so that
        //  `2e` lexes as a number followed by an identifier
        if let Some(b'e' | b'E') = self.peek() {
            let mut at = self.current + 1;
            if let Some(b'+' | b'-') = self.source.get(at) {
                at += 1;
            }
            if self.source.get(at).is_some_and(u8::is_ascii_digit) {
                self.current = at;
                self.consume_while(|b| b.is_ascii_digit());
            }
        }
    }

    /// Skips a quoted string body. Backslash escapes the next byte, so `\"`
    ///  does not terminate a double quoted string.
    fn consume_string_body(&mut self, term: u8) -> bool {
        while let Some(c) = self.peek() {
            self.current += 1;
            if c == b'\\' {
                if self.is_empty() {
                    return false;
                }
                self.current += 1;
            } else if c == term {
                return true;
            }
        }
        false
    }

    /// Returns the slice of the source that this token was lexed from.
    #[inline]
    pub fn source_of(&self, token: &Token) -> &'input [u8] {
        &self.source[token.start..token.end]
    }

    /// Like [source_of] but omits the delimiters of string literal and curly
    ///  identifier tokens. Escape sequences are left untouched.
    #[inline]
    pub fn contents(&self, token: &Token) -> &'input [u8] {
        let s = self.source_of(token);
        match token.ty {
            TokenType::StringSingleQuote
            | TokenType::StringDoubleQuote
            | TokenType::CurlyIdentifier => &s[1..s.len() - 1],
            _ => s,
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&self) -> Result<Option<Token>, Error> {
        self.clone().next_token()
    }

    /// Consumes the next token if it has type [ty].
    pub fn consume(&mut self, ty: TokenType) -> Result<bool, Error> {
        let mut ahead = self.clone();
        match ahead.next_token()? {
            Some(tok) if tok.ty == ty => {
                *self = ahead;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, Error> {
        self.consume_whitespace();

        let Some(first) = self.peek() else {
            return Ok(None);
        };
        let start = self.current;
        self.current += 1;

        // Convenience macro for returning a token from `start` to `self.current`
        // The match below will borrow self as mutable, so a simple closure won't
        //  do the trick.
        macro_rules! tok {
            ($name:ident) => {{
                Token {
                    ty: TokenType::$name,
                    start,
                    end: self.current,
                }
            }};
        }

        Ok(Some(match first {
            b'(' => tok!(ParenLeft),
            b')' => tok!(ParenRight),
            b',' => tok!(Comma),
            b'/' => tok!(ForwardSlash),
            b'%' => tok!(Percent),
            b'*' => tok!(Asterisk),

            // While +/- could be the start of a number, we treat them as
            //  operators and allow the parser to interpret them as unary or
            //  binary operators
            b'+' => tok!(Plus),
            b'-' => tok!(Minus),

            b'=' => {
                // `==` and `=` are the same comparison
                self.consume1(b'=');
                tok!(Equals)
            }
            b'!' => {
                if self.consume1(b'=') {
                    tok!(NotEquals)
                } else {
                    tok!(Bang)
                }
            }
            b'&' => {
                if self.consume1(b'&') {
                    tok!(And)
                } else {
                    tok!(Ampersand)
                }
            }
            b'|' => {
                if self.consume1(b'|') {
                    tok!(Or)
                } else {
                    return Err(Error::UnexpectedCharacter(start));
                }
            }
            b'<' => {
                if self.consume1(b'>') {
                    tok!(NotEquals)
                } else if self.consume1(b'=') {
                    tok!(LTE)
                } else {
                    tok!(LT)
                }
            }
            b'>' => {
                if self.consume1(b'=') {
                    tok!(GTE)
                } else {
                    tok!(GT)
                }
            }

            term @ (b'\'' | b'"') => {
                if !self.consume_string_body(term) {
                    return Err(Error::UnterminatedStringLiteral(start));
                }
                if term == b'"' {
                    tok!(StringDoubleQuote)
                } else {
                    tok!(StringSingleQuote)
                }
            }

            b'{' => {
                self.consume_while(|b| b != b'}');
                if !self.consume1(b'}') {
                    return Err(Error::UnterminatedCurlyIdentifier(start));
                }
                tok!(CurlyIdentifier)
            }

            // Identifiers start with a-Z or underscore
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.consume_while(|b| b.is_ascii_alphanumeric() || b == b'_');
                let word = &self.source[start..self.current];
                if word.eq_ignore_ascii_case(b"true") {
                    tok!(True)
                } else if word.eq_ignore_ascii_case(b"false") {
                    tok!(False)
                } else if word.eq_ignore_ascii_case(b"null") {
                    tok!(Null)
                } else {
                    tok!(Identifier)
                }
            }

            b'0'..=b'9' => {
                self.current = start;
                self.consume_number();
                tok!(Number)
            }

            // A leading dot is only a number when a digit follows: `.5`
            b'.' if self.peek().is_some_and(|b| b.is_ascii_digit()) => {
                self.current = start;
                self.consume_number();
                tok!(Number)
            }
            _ => return Err(Error::UnexpectedCharacter(start)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_basic() {
        //NOTE this test doesn't use the handy assert_toks macro because we're
        //  checking that the token boundaries are correct as well.
        //              0         1         2         3
        //              0123456789012345678901234567890
        let source = r#"'single' & "double" (,/) !true"#;
        let mut lexer = Lexer::new(source.as_bytes());

        let tok = lexer.next_token();
        assert_eq!(
            tok,
            Ok(Some(Token {
                ty: TokenType::StringSingleQuote,
                start: 0,
                end: 8
            }))
        );
        assert_eq!(lexer.contents(&tok.unwrap().unwrap()), b"single");

        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::Ampersand,
                start: 9,
                end: 10
            }))
        );
        let tok = lexer.next_token();
        assert_eq!(
            tok,
            Ok(Some(Token {
                ty: TokenType::StringDoubleQuote,
                start: 11,
                end: 19
            }))
        );
        assert_eq!(lexer.contents(&tok.unwrap().unwrap()), b"double");

        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::ParenLeft,
                start: 20,
                end: 21
            }))
        );
        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::Comma,
                start: 21,
                end: 22
            }))
        );
        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::ForwardSlash,
                start: 22,
                end: 23
            }))
        );
        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::ParenRight,
                start: 23,
                end: 24
            }))
        );
        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::Bang,
                start: 25,
                end: 26
            }))
        );
        assert_eq!(
            lexer.next_token(),
            Ok(Some(Token {
                ty: TokenType::True,
                start: 26,
                end: 30
            }))
        );
        assert_eq!(lexer.next_token(), Ok(None));
    }

    #[test]
    fn lex_numbers() {
        //             0         1
        //             0123456789012345678
        let source = b"12.3 4+5. - .6 1e3";
        let mut lexer = Lexer::new(source);
        let expected = [
            (TokenType::Number, 0, 4),
            (TokenType::Number, 5, 6),
            (TokenType::Plus, 6, 7),
            (TokenType::Number, 7, 9),
            (TokenType::Minus, 10, 11),
            (TokenType::Number, 12, 14),
            (TokenType::Number, 15, 18),
        ];
        for (ty, start, end) in expected {
            assert_eq!(lexer.next_token(), Ok(Some(Token { ty, start, end })));
        }
    }

    macro_rules! assert_tok {
        ($lex:ident, $tok_ty:ident) => {{
            let tok = $lex.next_token();
            assert!(
                matches!(
                    tok,
                    Ok(Some(Token {
                        ty: TokenType::$tok_ty,
                        ..
                    }))
                ),
                "Expected {}, got {tok:?}",
                stringify!($tok_ty)
            );
        }};
    }
    macro_rules! assert_toks {
        ($lex:ident, $tok_ty:ident) => {{
            assert_tok!($lex, $tok_ty)
        }};
        ($lex:ident, $tok_ty:ident, $($rest:tt)*) => {
            assert_tok!($lex, $tok_ty);
            assert_toks!($lex, $($rest)*)
        };
    }

    #[test]
    fn lex_comparisons() {
        let source = b"= == != <> < > <= >=";
        let mut lexer = Lexer::new(source);
        assert_toks!(lexer, Equals, Equals, NotEquals, NotEquals, LT, GT, LTE, GTE);
    }

    #[test]
    fn lex_logical() {
        let source = b"a && b || !c & d % 2";
        let mut lexer = Lexer::new(source);
        assert_toks!(
            lexer, Identifier, And, Identifier, Or, Bang, Identifier, Ampersand, Identifier,
            Percent, Number
        );
    }

    #[test]
    fn lex_curly_identifier() {
        let source = b"{Unit Price} * 2";
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token().unwrap().unwrap();
        assert_eq!(tok.ty, TokenType::CurlyIdentifier);
        assert_eq!(lexer.contents(&tok), b"Unit Price");
        assert_toks!(lexer, Asterisk, Number);
    }

    #[test]
    fn lex_keywords_ignore_case() {
        let source = b"TRUE False null Nullable";
        let mut lexer = Lexer::new(source);
        assert_toks!(lexer, True, False, Null, Identifier);
    }

    #[test]
    fn escaped_quote_does_not_terminate() {
        let source = br#""say \"hi\"" x"#;
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token().unwrap().unwrap();
        assert_eq!(tok.ty, TokenType::StringDoubleQuote);
        assert_eq!(lexer.contents(&tok), br#"say \"hi\""#);
        assert_toks!(lexer, Identifier);
    }

    #[test]
    fn lex_errors() {
        assert_eq!(
            Lexer::new(b"'abc").next_token(),
            Err(Error::UnterminatedStringLiteral(0))
        );
        assert_eq!(
            Lexer::new(b"  {abc").next_token(),
            Err(Error::UnterminatedCurlyIdentifier(2))
        );
        let mut lexer = Lexer::new(b"a | b");
        _ = lexer.next_token();
        assert_eq!(lexer.next_token(), Err(Error::UnexpectedCharacter(2)));
        assert_eq!(Lexer::new(b"#").next_token(), Err(Error::UnexpectedCharacter(0)));
    }

    #[test]
    fn peek_and_consume() {
        let mut lexer = Lexer::new(b"( x");
        assert_eq!(
            lexer.peek_token().unwrap().map(|t| t.ty),
            Some(TokenType::ParenLeft)
        );
        assert_eq!(lexer.consume(TokenType::Comma), Ok(false));
        assert_eq!(lexer.consume(TokenType::ParenLeft), Ok(true));
        assert_toks!(lexer, Identifier);
    }
}
