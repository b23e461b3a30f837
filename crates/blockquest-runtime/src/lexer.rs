//! Tokenizer for compiled program source.

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    /// Identifiers and keywords alike; the parser tells them apart.
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// Longest first, so `<=` wins over `<`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "{", "}", "[", "]", ",", ";",
    ".", "=", "<", ">", "+", "-", "*", "/", "%", "!", ":",
];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

/// Splits `source` into tokens, ending with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, RuntimeError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        let (line, col) = (lexer.line, lexer.col);
        let Some(c) = lexer.peek() else {
            tokens.push(Token { kind: TokenKind::Eof, line, col });
            return Ok(tokens);
        };
        let kind = if c.is_ascii_digit() || (c == '.' && lexer.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            lexer.number()?
        } else if c == '"' || c == '\'' {
            lexer.string(c)?
        } else if is_ident_start(c) {
            lexer.ident()
        } else {
            lexer.punct()?
        };
        tokens.push(Token { kind, line, col });
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Parse {
            line: self.line,
            col: self.col,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), RuntimeError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return Err(self.error("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind, RuntimeError> {
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            text.extend(self.bump());
        }
        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            text.extend(self.bump());
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                text.extend(self.bump());
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.extend(self.bump());
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error(format!("invalid number literal {text:?}")))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, RuntimeError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal"));
            };
            match c {
                c if c == quote => return Ok(TokenKind::Str(out)),
                '\n' => return Err(self.error("newline in string literal")),
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(self.error("unterminated escape"));
                    };
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        '0' => out.push('\0'),
                        'u' => out.push(self.unicode_escape()?),
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, RuntimeError> {
        let code = self.hex4()?;
        if (0xD800..0xDC00).contains(&code) {
            // High surrogate: JSON encodes astral characters as a pair.
            if self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
                self.bump();
                self.bump();
                let low = self.hex4()?;
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
                return Ok(char::from_u32(combined).unwrap_or('\u{FFFD}'));
            }
            return Ok('\u{FFFD}');
        }
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn hex4(&mut self) -> Result<u32, RuntimeError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid \\u escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while self.peek().is_some_and(is_ident_continue) {
            text.extend(self.bump());
        }
        TokenKind::Ident(text)
    }

    fn punct(&mut self) -> Result<TokenKind, RuntimeError> {
        for p in PUNCTUATION {
            let matches = p
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matches {
                for _ in 0..p.len() {
                    self.bump();
                }
                // Strict and loose equality behave the same here.
                let normalized = match *p {
                    "===" => "==",
                    "!==" => "!=",
                    other => other,
                };
                return Ok(TokenKind::Punct(normalized));
            }
        }
        let c = self.peek().unwrap_or('?');
        Err(self.error(format!("unexpected character {c:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn statement_tokens() {
        assert_eq!(
            kinds("let $repeat0 = 1.5; // done"),
            vec![
                TokenKind::Ident("let".into()),
                TokenKind::Ident("$repeat0".into()),
                TokenKind::Punct("="),
                TokenKind::Number(1.5),
                TokenKind::Punct(";"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn operators_prefer_longest_match() {
        assert_eq!(
            kinds("a <= b === c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("<="),
                TokenKind::Ident("b".into()),
                TokenKind::Punct("=="),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn json_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"\né""#)[0],
            TokenKind::Str("say \"hi\"\né".into())
        );
    }

    #[test]
    fn positions_track_lines() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(tokenize("\"abc"), Err(RuntimeError::Parse { .. })));
    }
}
