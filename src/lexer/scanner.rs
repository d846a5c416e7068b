// Sable Scanner
// Converts source text into tokens

use crate::error::{SableError, SableResult, Span};
use crate::lexer::token::{Token, TokenKind};

pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_column: usize,
    file: String,
}

impl Scanner {
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_column: 1,
            file: file.into(),
        }
    }

    /// Scan all tokens from the source, ending with `Eof`
    pub fn scan_tokens(mut self) -> SableResult<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token()?;
        }

        let eof = Span::single(self.line, self.column, self.current);
        self.tokens.push(Token::new(TokenKind::Eof, "", eof));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> SableResult<()> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            ':' => self.add_token(TokenKind::Colon),
            '^' => self.add_token(TokenKind::Caret),
            '~' => self.add_token(TokenKind::Tilde),
            '.' => {
                if self.peek() == '.' && self.peek_next() == '.' {
                    self.advance();
                    self.advance();
                    self.add_token(TokenKind::DotDotDot);
                } else {
                    self.add_token(TokenKind::Dot);
                }
            }
            '+' => {
                let kind = if self.match_char('=') {
                    TokenKind::PlusEqual
                } else {
                    TokenKind::Plus
                };
                self.add_token(kind);
            }
            '-' => {
                let kind = if self.match_char('=') {
                    TokenKind::MinusEqual
                } else if self.match_char('>') {
                    TokenKind::ThinArrow
                } else {
                    TokenKind::Minus
                };
                self.add_token(kind);
            }
            '*' => {
                let kind = if self.match_char('=') {
                    TokenKind::StarEqual
                } else {
                    TokenKind::Star
                };
                self.add_token(kind);
            }
            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_char('*') {
                    self.block_comment()?;
                } else if self.match_char('=') {
                    self.add_token(TokenKind::SlashEqual);
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            '!' => {
                let kind = if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LessEqual
                } else if self.match_char('<') {
                    TokenKind::LessLess
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else if self.match_char('>') {
                    TokenKind::GreaterGreater
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '&' => {
                let kind = if self.match_char('&') {
                    TokenKind::And
                } else {
                    TokenKind::Ampersand
                };
                self.add_token(kind);
            }
            '|' => {
                let kind = if self.match_char('|') {
                    TokenKind::Or
                } else {
                    TokenKind::Pipe
                };
                self.add_token(kind);
            }

            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            '"' => self.string()?,

            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),

            _ => {
                return Err(self
                    .error(&format!("Unexpected character '{}'", c))
                    .with_help("Remove this character or check for typos"));
            }
        }

        Ok(())
    }

    fn string(&mut self) -> SableResult<()> {
        let start_line = self.line;
        let start_col = self.start_column;

        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
            }
            if self.peek() == '\n' {
                self.line += 1;
                self.column = 0;
            }
            self.advance();
        }

        if self.is_at_end() {
            return Err(SableError::syntax_error(
                "Unterminated string",
                Span::from_positions(start_line, start_col, self.line, self.column),
                &self.file,
            )
            .with_help("Add a closing double quote to terminate the string"));
        }

        self.advance();

        let raw: String = self.source[self.start + 1..self.current - 1].iter().collect();
        let value = self.process_escapes(&raw)?;
        self.add_token(TokenKind::String(value));
        Ok(())
    }

    fn process_escapes(&self, s: &str) -> SableResult<String> {
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            if c != '\\' {
                result.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('0') => result.push('\0'),
                Some(other) => {
                    return Err(self
                        .error(&format!("Invalid escape sequence '\\{}'", other))
                        .with_help("Valid escapes: \\n, \\t, \\r, \\0, \\\\, \\\""));
                }
                None => {
                    return Err(self.error("Unexpected end of string after '\\'"));
                }
            }
        }

        Ok(result)
    }

    fn number(&mut self) -> SableResult<()> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let value: f64 = lexeme
            .parse()
            .map_err(|_| self.error(&format!("Invalid number '{}'", lexeme)))?;

        self.add_token(TokenKind::Number(value));
        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = keyword_or_identifier(&text);
        self.add_token(kind);
    }

    fn block_comment(&mut self) -> SableResult<()> {
        let start_line = self.line;
        let start_col = self.start_column;

        loop {
            if self.is_at_end() {
                return Err(SableError::syntax_error(
                    "Unterminated block comment",
                    Span::from_positions(start_line, start_col, self.line, self.column),
                    &self.file,
                )
                .with_help("Add '*/' to close the block comment"));
            }
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return Ok(());
            }
            if self.peek() == '\n' {
                self.line += 1;
                self.column = 0;
            }
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected || self.is_at_end() {
            return false;
        }
        self.current += 1;
        self.column += 1;
        true
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let span = Span::new(
            crate::error::Position::new(self.line, self.start_column, self.start),
            crate::error::Position::new(self.line, self.column, self.current),
        );
        self.tokens.push(Token::new(kind, lexeme, span));
    }

    fn error(&self, message: &str) -> SableError {
        SableError::syntax_error(
            message,
            Span::from_positions(self.line, self.start_column, self.line, self.column),
            &self.file,
        )
    }
}

fn keyword_or_identifier(text: &str) -> TokenKind {
    match text {
        "local" => TokenKind::Local,
        "fun" => TokenKind::Fun,
        "class" => TokenKind::Class,
        "enum" => TokenKind::Enum,
        "interface" => TokenKind::Interface,
        "new" => TokenKind::New,
        "this" => TokenKind::This,
        "super" => TokenKind::Super,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "foreach" => TokenKind::Foreach,
        "do" => TokenKind::Do,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "import" => TokenKind::Import,
        "from" => TokenKind::From,
        "static" => TokenKind::Static,
        "operator" => TokenKind::Operator,
        "var" => TokenKind::Var,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => TokenKind::Identifier(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source, "test.sbl")
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("local x -> ... <<= && ~"),
            vec![
                TokenKind::Local,
                TokenKind::Identifier("x".to_string()),
                TokenKind::ThinArrow,
                TokenKind::DotDotDot,
                TokenKind::LessLess,
                TokenKind::Equal,
                TokenKind::And,
                TokenKind::Tilde,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // one\n/* two\n lines */ 2.5"),
            vec![TokenKind::Number(1.0), TokenKind::Number(2.5), TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\n\"b\"""#),
            vec![TokenKind::String("a\n\"b\"".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Scanner::new("a\n  bc", "test.sbl").scan_tokens().unwrap();
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        let error = Scanner::new("\"abc", "test.sbl").scan_tokens().unwrap_err();
        assert_eq!(error.kind, crate::error::ErrorKind::SyntaxError);
        assert_eq!(error.message, "Unterminated string");
    }
}
