use crate::error::{ErrorKind, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    StringLiteral,
    IntegerLiteral,
    RealLiteral,
    // Operators
    Exclamation,
    Percent,
    Ampersand,
    Asterisk,
    Plus,
    Minus,
    Slash,
    LessThan,
    Equal,
    GreaterThan,
    Question,
    Bar,
    ExclamationEqual,
    DoubleAmpersand,
    LessThanEqual,
    LessGreater,
    DoubleEqual,
    GreaterThanEqual,
    DoubleBar,
    // Punctuation
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Dot,
    Colon,
    End,
}

/// A token with its source text and the char offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text. String literals keep their delimiters and escapes.
    pub text: String,
    pub pos: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True for an identifier token spelling `word`, ignoring case.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}

/// Cursor over expression text, producing one token per call.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(text: &str) -> Self {
        Lexer {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn ch(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    fn bump_if(&mut self, c: char) -> bool {
        if self.ch() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take_digits(&mut self) {
        while matches!(self.ch(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn expect_digit(&self) -> Result<(), ParseError> {
        match self.ch() {
            Some(c) if c.is_ascii_digit() => Ok(()),
            _ => Err(ParseError::new(ErrorKind::DigitExpected, self.pos)),
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        while matches!(self.ch(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(c) = self.ch() else {
            return Ok(Token {
                kind: TokenKind::End,
                text: String::new(),
                pos: start,
            });
        };
        self.bump();

        let kind = match c {
            '!' if self.bump_if('=') => TokenKind::ExclamationEqual,
            '!' => TokenKind::Exclamation,
            '%' => TokenKind::Percent,
            '&' if self.bump_if('&') => TokenKind::DoubleAmpersand,
            '&' => TokenKind::Ampersand,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '*' => TokenKind::Asterisk,
            '+' => TokenKind::Plus,
            ',' => TokenKind::Comma,
            '-' => TokenKind::Minus,
            '.' => TokenKind::Dot,
            '/' => TokenKind::Slash,
            ':' => TokenKind::Colon,
            '<' if self.bump_if('=') => TokenKind::LessThanEqual,
            '<' if self.bump_if('>') => TokenKind::LessGreater,
            '<' => TokenKind::LessThan,
            '=' if self.bump_if('=') => TokenKind::DoubleEqual,
            '=' => TokenKind::Equal,
            '>' if self.bump_if('=') => TokenKind::GreaterThanEqual,
            '>' => TokenKind::GreaterThan,
            '?' => TokenKind::Question,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            '|' if self.bump_if('|') => TokenKind::DoubleBar,
            '|' => TokenKind::Bar,
            '"' | '\'' => {
                // A doubled delimiter continues the literal.
                loop {
                    while matches!(self.ch(), Some(x) if x != c) {
                        self.pos += 1;
                    }
                    if self.ch().is_none() {
                        return Err(ParseError::new(
                            ErrorKind::UnterminatedStringLiteral,
                            self.pos,
                        ));
                    }
                    self.bump();
                    if !self.bump_if(c) {
                        break;
                    }
                }
                TokenKind::StringLiteral
            }
            c if c.is_alphabetic() || c == '@' || c == '_' => {
                while matches!(self.ch(), Some(x) if x.is_alphanumeric() || x == '_') {
                    self.pos += 1;
                }
                TokenKind::Identifier
            }
            c if c.is_ascii_digit() => self.scan_number()?,
            other => {
                return Err(ParseError::new(ErrorKind::InvalidCharacter(other), start));
            }
        };

        Ok(Token {
            kind,
            text: self.chars[start..self.pos].iter().collect(),
            pos: start,
        })
    }

    /// Scans the rest of a numeric literal whose first digit is consumed.
    fn scan_number(&mut self) -> Result<TokenKind, ParseError> {
        let mut kind = TokenKind::IntegerLiteral;
        self.take_digits();
        if self.ch() == Some('.') {
            kind = TokenKind::RealLiteral;
            self.bump();
            self.expect_digit()?;
            self.take_digits();
        }
        if matches!(self.ch(), Some('e' | 'E')) {
            kind = TokenKind::RealLiteral;
            self.bump();
            if matches!(self.ch(), Some('+' | '-')) {
                self.bump();
            }
            self.expect_digit()?;
            self.take_digits();
        }
        if matches!(self.ch(), Some('f' | 'F')) {
            kind = TokenKind::RealLiteral;
            self.bump();
        }
        Ok(kind)
    }
}

/// Tokenizes a whole expression, including the trailing `End` token.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.is(TokenKind::End);
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn operators_and_punctuation() {
        use TokenKind::*;
        assert_eq!(
            kinds("a != b <> c <= d >= e == f && g || h"),
            vec![
                Identifier,
                ExclamationEqual,
                Identifier,
                LessGreater,
                Identifier,
                LessThanEqual,
                Identifier,
                GreaterThanEqual,
                Identifier,
                DoubleEqual,
                Identifier,
                DoubleAmpersand,
                Identifier,
                DoubleBar,
                Identifier,
                End
            ]
        );
        assert_eq!(
            kinds("!%&()*+,-./:<=>?[]|"),
            vec![
                Exclamation,
                Percent,
                Ampersand,
                OpenParen,
                CloseParen,
                Asterisk,
                Plus,
                Comma,
                Minus,
                Dot,
                Slash,
                Colon,
                LessThanEqual,
                GreaterThan,
                Question,
                OpenBracket,
                CloseBracket,
                Bar,
                End
            ]
        );
    }

    #[test]
    fn minus_is_never_folded_by_the_lexer() {
        use TokenKind::*;
        assert_eq!(
            kinds("3-1"),
            vec![IntegerLiteral, Minus, IntegerLiteral, End]
        );
    }

    #[test]
    fn numeric_literals() {
        let toks = tokenize("42 1.5 2e10 3E-2 1.5f 7F").unwrap();
        let got: Vec<_> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::IntegerLiteral, "42"),
                (TokenKind::RealLiteral, "1.5"),
                (TokenKind::RealLiteral, "2e10"),
                (TokenKind::RealLiteral, "3E-2"),
                (TokenKind::RealLiteral, "1.5f"),
                (TokenKind::RealLiteral, "7F"),
                (TokenKind::End, ""),
            ]
        );
    }

    #[test]
    fn missing_fraction_digit() {
        let err = tokenize("1.x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DigitExpected);
        assert_eq!(err.position, 2);
        let err = tokenize("1e+").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DigitExpected);
    }

    #[test]
    fn string_literals_keep_doubled_delimiters() {
        let toks = tokenize(r#""test ""string""" 'x' 'it''s'"#).unwrap();
        assert_eq!(toks[0].text, r#""test ""string""""#);
        assert_eq!(toks[1].text, "'x'");
        assert_eq!(toks[2].text, "'it''s'");
        assert_eq!(toks[3].kind, TokenKind::End);
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("Name == \"abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedStringLiteral);
        assert_eq!(err.position, 12);
    }

    #[test]
    fn identifiers_and_positions() {
        let toks = tokenize("  @0 _x Name1").unwrap();
        assert_eq!(toks[0].text, "@0");
        assert_eq!(toks[0].pos, 2);
        assert_eq!(toks[1].text, "_x");
        assert_eq!(toks[2].text, "Name1");
        assert_eq!(toks[2].pos, 8);
    }

    #[test]
    fn invalid_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCharacter('#'));
        assert_eq!(err.position, 2);
    }
}
