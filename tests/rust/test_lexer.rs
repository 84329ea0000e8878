//! Lexer tests — tokenization, literals, comments, error handling

use rowan_lang::lexer::tokens::{TokenLiteral, TokenType};
use rowan_lang::lexer::Lexer;

fn lex(source: &str) -> Vec<(TokenType, String)> {
    let (tokens, errors) = Lexer::new(source).tokenize();
    assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
    tokens
        .into_iter()
        .filter(|t| !matches!(t.token_type, TokenType::Eof))
        .map(|t| (t.token_type, t.lexeme))
        .collect()
}

fn lex_types(source: &str) -> Vec<TokenType> {
    lex(source).into_iter().map(|(tt, _)| tt).collect()
}

fn lex_err(source: &str) -> String {
    let (_, errors) = Lexer::new(source).tokenize();
    assert!(!errors.is_empty(), "expected a lex error");
    format!("{}", errors[0])
}

// ── Basic tokens ────────────────────────────────────────────

#[test]
fn identifier() {
    let tokens = lex("hello");
    assert_eq!(tokens, vec![(TokenType::Identifier, "hello".into())]);
}

#[test]
fn punctuation() {
    assert_eq!(
        lex_types("( ) { } , . - + ; * ? :"),
        vec![
            TokenType::LeftParen,
            TokenType::RightParen,
            TokenType::LeftBrace,
            TokenType::RightBrace,
            TokenType::Comma,
            TokenType::Dot,
            TokenType::Minus,
            TokenType::Plus,
            TokenType::Semicolon,
            TokenType::Star,
            TokenType::Question,
            TokenType::Colon,
        ]
    );
}

#[test]
fn one_and_two_char_operators() {
    assert_eq!(
        lex_types("! != = == < <= > >="),
        vec![
            TokenType::Bang,
            TokenType::BangEqual,
            TokenType::Equal,
            TokenType::EqualEqual,
            TokenType::Less,
            TokenType::LessEqual,
            TokenType::Greater,
            TokenType::GreaterEqual,
        ]
    );
}

#[test]
fn keywords() {
    assert_eq!(
        lex_types("and class else false fun for if nil or print return super this true var while break continue"),
        vec![
            TokenType::And,
            TokenType::Class,
            TokenType::Else,
            TokenType::False,
            TokenType::Fun,
            TokenType::For,
            TokenType::If,
            TokenType::Nil,
            TokenType::Or,
            TokenType::Print,
            TokenType::Return,
            TokenType::Super,
            TokenType::This,
            TokenType::True,
            TokenType::Var,
            TokenType::While,
            TokenType::Break,
            TokenType::Continue,
        ]
    );
}

#[test]
fn keyword_prefix_is_an_identifier() {
    assert_eq!(lex_types("orchid"), vec![TokenType::Identifier]);
    assert_eq!(lex_types("classy"), vec![TokenType::Identifier]);
}

// ── Literals ────────────────────────────────────────────────

#[test]
fn integer_literal() {
    let (tokens, errors) = Lexer::new("42").tokenize();
    assert!(errors.is_empty());
    assert_eq!(tokens[0].literal, Some(TokenLiteral::Number(42.0)));
}

#[test]
fn fractional_literal() {
    let (tokens, errors) = Lexer::new("3.14").tokenize();
    assert!(errors.is_empty());
    assert_eq!(tokens[0].literal, Some(TokenLiteral::Number(3.14)));
}

#[test]
fn trailing_dot_is_not_part_of_the_number() {
    assert_eq!(
        lex_types("123."),
        vec![TokenType::Number, TokenType::Dot]
    );
}

#[test]
fn string_literal() {
    let (tokens, errors) = Lexer::new("\"hello world\"").tokenize();
    assert!(errors.is_empty());
    assert_eq!(
        tokens[0].literal,
        Some(TokenLiteral::Str("hello world".into()))
    );
}

#[test]
fn multi_line_string_tracks_lines() {
    let (tokens, errors) = Lexer::new("\"a\nb\" x").tokenize();
    assert!(errors.is_empty());
    assert_eq!(tokens[0].literal, Some(TokenLiteral::Str("a\nb".into())));
    // the identifier after the string sits on line 2
    assert_eq!(tokens[1].line, 2);
}

#[test]
fn unterminated_string() {
    assert_eq!(lex_err("\"oops"), "[line 1] Error: Unterminated string.");
}

// ── Comments and whitespace ─────────────────────────────────

#[test]
fn line_comment_runs_to_end_of_line() {
    assert_eq!(
        lex_types("1 // 2 3 4\n5"),
        vec![TokenType::Number, TokenType::Number]
    );
}

#[test]
fn block_comment() {
    assert_eq!(
        lex_types("1 /* anything\n at all */ 2"),
        vec![TokenType::Number, TokenType::Number]
    );
}

#[test]
fn unterminated_block_comment_is_silent() {
    assert_eq!(lex_types("1 /* never closed"), vec![TokenType::Number]);
}

#[test]
fn newlines_advance_line_numbers() {
    let (tokens, errors) = Lexer::new("a\nb\nc").tokenize();
    assert!(errors.is_empty());
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].line, 2);
    assert_eq!(tokens[2].line, 3);
}

// ── Error handling ──────────────────────────────────────────

#[test]
fn unexpected_character() {
    assert_eq!(lex_err("@"), "[line 1] Error: Unexpected character '@'.");
}

#[test]
fn lexing_continues_past_an_error() {
    let (tokens, errors) = Lexer::new("@ 42").tokenize();
    assert_eq!(errors.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::Number);
}

#[test]
fn eof_token_is_always_last() {
    let (tokens, _) = Lexer::new("").tokenize();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::Eof);
}
