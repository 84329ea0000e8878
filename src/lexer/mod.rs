pub mod tokens;

use std::fmt;

use tokens::{keyword_type, Token, TokenLiteral, TokenType};

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

pub struct Lexer {
    source: Vec<char>,
    start: usize,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            start: 0,
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Scan the whole source. Errors are accumulated rather than fatal so a
    /// single pass can report every bad character; the token stream covers
    /// everything that did scan.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        while !self.at_end() {
            self.start = self.pos;
            self.scan_token();
        }

        self.tokens
            .push(Token::new(TokenType::Eof, "", None, self.line));
        (self.tokens, self.errors)
    }

    fn scan_token(&mut self) {
        let ch = self.advance();
        match ch {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '?' => self.add_token(TokenType::Question),
            ':' => self.add_token(TokenType::Colon),
            '!' => {
                let tt = if self.match_next('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(tt);
            }
            '=' => {
                let tt = if self.match_next('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(tt);
            }
            '<' => {
                let tt = if self.match_next('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(tt);
            }
            '>' => {
                let tt = if self.match_next('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(tt);
            }
            '/' => {
                if self.match_next('/') {
                    self.skip_line_comment();
                } else if self.match_next('*') {
                    self.skip_block_comment();
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.scan_string(),
            _ => {
                if ch.is_ascii_digit() {
                    self.scan_number();
                } else if ch.is_alphabetic() || ch == '_' {
                    self.scan_identifier();
                } else {
                    self.error(format!("Unexpected character '{}'.", ch));
                }
            }
        }
    }

    fn scan_string(&mut self) {
        let start_line = self.line;
        while !self.at_end() && self.peek() != '"' {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.at_end() {
            self.errors.push(LexError {
                message: "Unterminated string.".to_string(),
                line: start_line,
            });
            return;
        }

        self.advance(); // closing quote

        // Strings have no escape sequences; the literal is the raw text
        // between the quotes.
        let value: String = self.source[self.start + 1..self.pos - 1].iter().collect();
        let lexeme: String = self.source[self.start..self.pos].iter().collect();
        self.tokens.push(Token {
            token_type: TokenType::Str,
            lexeme,
            literal: Some(TokenLiteral::Str(value)),
            line: start_line,
        });
    }

    fn scan_number(&mut self) {
        while !self.at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }

        // A fractional part only if the dot is followed by a digit, so
        // "123." scans as a number and then a Dot token.
        if !self.at_end()
            && self.peek() == '.'
            && self.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while !self.at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme: String = self.source[self.start..self.pos].iter().collect();
        match lexeme.parse::<f64>() {
            Ok(n) => self.tokens.push(Token {
                token_type: TokenType::Number,
                lexeme,
                literal: Some(TokenLiteral::Number(n)),
                line: self.line,
            }),
            Err(_) => self.error(format!("Invalid number literal '{}'.", lexeme)),
        }
    }

    fn scan_identifier(&mut self) {
        while !self.at_end() && (self.peek().is_alphanumeric() || self.peek() == '_') {
            self.advance();
        }

        let word: String = self.source[self.start..self.pos].iter().collect();
        let tt = keyword_type(&word).unwrap_or(TokenType::Identifier);
        self.tokens.push(Token {
            token_type: tt,
            lexeme: word,
            literal: None,
            line: self.line,
        });
    }

    fn skip_line_comment(&mut self) {
        while !self.at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        // An open block comment at EOF is treated as terminated there.
        while !self.at_end() {
            if self.peek() == '*' && self.peek_next() == Some('/') {
                self.advance();
                self.advance();
                return;
            }
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn peek(&self) -> char {
        self.source[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.pos];
        self.pos += 1;
        ch
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.at_end() || self.peek() != expected {
            return false;
        }
        self.pos += 1;
        true
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn add_token(&mut self, token_type: TokenType) {
        let lexeme: String = self.source[self.start..self.pos].iter().collect();
        self.tokens
            .push(Token::new(token_type, &lexeme, None, self.line));
    }

    fn error(&mut self, message: String) {
        self.errors.push(LexError {
            message,
            line: self.line,
        });
    }
}
