use std::fmt;
use std::rc::Rc;

use crate::ast::{next_expr_id, Expr, FunctionDecl, LiteralValue, Stmt};
use crate::lexer::tokens::{Token, TokenLiteral, TokenType};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    /// Either empty, " at end", or " at '<lexeme>'".
    pub location: String,
}

impl ParseError {
    fn at(token: &Token, message: &str) -> Self {
        let location = if token.token_type == TokenType::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        Self {
            message: message.to_string(),
            line: token.line,
            location,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

const MAX_PARSER_DEPTH: usize = 256;
const MAX_ARITY: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }

    // ── Public API ──────────────────────────────────────────────────────

    /// Parse the whole token stream. Statement-level errors are accumulated
    /// and recovery skips to the next likely statement boundary, so one pass
    /// can surface several independent mistakes. A non-empty error list must
    /// gate resolution and interpretation.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut statements = Vec::new();
        while !self.at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        (statements, self.errors)
    }

    // ── Declarations ────────────────────────────────────────────────────

    // declaration -> classDecl | funDecl | varDecl | statement
    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.check(TokenType::Class) {
            self.advance();
            return self.class_declaration();
        }
        // "fun" followed by an identifier is a named declaration; a bare
        // "fun (" falls through to the expression grammar as a lambda.
        if self.check(TokenType::Fun) && self.check_next(TokenType::Identifier) {
            self.advance();
            let decl = self.function("function")?;
            return Ok(Stmt::Function(Rc::new(decl)));
        }
        if self.check(TokenType::Var) {
            self.advance();
            return self.var_declaration();
        }

        self.statement()
    }

    // classDecl -> "class" identifier ( "<" identifier )? "{" ( "class"? function )* "}"
    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenType::Identifier, "Expect class name.")?.clone();

        let superclass = if self.check(TokenType::Less) {
            self.advance();
            let super_name = self
                .expect(TokenType::Identifier, "Expect superclass name.")?
                .clone();
            Some(Expr::Variable {
                id: next_expr_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.expect(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut class_methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.at_end() {
            if self.check(TokenType::Class) {
                self.advance();
                class_methods.push(Rc::new(self.function("class method")?));
            } else {
                methods.push(Rc::new(self.function("method")?));
            }
        }

        self.expect(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            class_methods,
        })
    }

    // function -> identifier "(" parameters? ")" block
    fn function(&mut self, kind: &str) -> Result<FunctionDecl, ParseError> {
        let name = self
            .expect(TokenType::Identifier, &format!("Expect {} name.", kind))?
            .clone();
        self.expect(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let params = self.parameters()?;
        self.expect(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block_statements()?;

        Ok(FunctionDecl {
            name,
            params: Rc::new(params),
            body: Rc::new(body),
        })
    }

    // parameters -> identifier ( "," identifier )*
    fn parameters(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    // Non-fatal: report and keep parsing.
                    let err = ParseError::at(self.current(), "Can't have more than 255 parameters.");
                    self.errors.push(err);
                }
                params.push(
                    self.expect(TokenType::Identifier, "Expect parameter name.")?
                        .clone(),
                );
                if !self.check(TokenType::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(TokenType::RightParen, "Expect ')' after parameters.")?;
        Ok(params)
    }

    // varDeclaration -> "var" identifier ( "=" expression )? ";"
    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self
            .expect(TokenType::Identifier, "Expect variable name.")?
            .clone();

        let initializer = if self.check(TokenType::Equal) {
            self.advance();
            Some(self.expression()?)
        } else {
            None
        };

        self.expect(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // ── Statements ──────────────────────────────────────────────────────

    // statement -> exprStatement | forStatement | ifStatement | printStatement
    //            | returnStatement | whileStatement | breakStatement
    //            | continueStatement | block
    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.check(TokenType::Break) {
            let keyword = self.advance().clone();
            self.expect(TokenType::Semicolon, "Expect ';' after 'break'.")?;
            return Ok(Stmt::Break { keyword });
        }
        if self.check(TokenType::Continue) {
            let keyword = self.advance().clone();
            self.expect(TokenType::Semicolon, "Expect ';' after 'continue'.")?;
            return Ok(Stmt::Continue { keyword });
        }
        if self.check(TokenType::For) {
            self.advance();
            return self.for_statement();
        }
        if self.check(TokenType::If) {
            self.advance();
            return self.if_statement();
        }
        if self.check(TokenType::Print) {
            self.advance();
            let expression = self.expression()?;
            self.expect(TokenType::Semicolon, "Expect ';' after value.")?;
            return Ok(Stmt::Print { expression });
        }
        if self.check(TokenType::Return) {
            return self.return_statement();
        }
        if self.check(TokenType::While) {
            self.advance();
            return self.while_statement();
        }
        if self.check(TokenType::LeftBrace) {
            self.advance();
            let statements = self.block_statements()?;
            return Ok(Stmt::Block { statements });
        }

        let expression = self.expression()?;
        self.expect(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.advance().clone();
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // forStatement -> "for" "(" ( varDeclaration | exprStatement | ";" )
    //                     expression? ";" expression? ")" statement
    //
    // De-sugared here into a while loop; the interpreter never sees "for".
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.check(TokenType::Semicolon) {
            self.advance();
            None
        } else if self.check(TokenType::Var) {
            self.advance();
            Some(self.var_declaration()?)
        } else {
            let expression = self.expression()?;
            self.expect(TokenType::Semicolon, "Expect ';' after expression.")?;
            Some(Stmt::Expression { expression })
        };

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![
                    body,
                    Stmt::Expression {
                        expression: increment,
                    },
                ],
            };
        }
        let condition = condition.unwrap_or(Expr::Literal {
            value: LiteralValue::Bool(true),
        });
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };
        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
            };
        }

        Ok(body)
    }

    // whileStatement -> "while" "(" expression ")" statement
    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.expect(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    // ifStatement -> "if" "(" expression ")" statement ( "else" statement )?
    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.expect(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.check(TokenType::Else) {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    // block -> "{" declaration* "}"
    fn block_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        self.expect(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    /// Throw away tokens until something that looks like the beginning of the
    /// next statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }
            match self.current().token_type {
                TokenType::Break
                | TokenType::Continue
                | TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    // expression -> comma
    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.enter_depth()?;
        let result = self.comma();
        self.exit_depth();
        result
    }

    // comma -> assignment ( "," assignment )*
    //
    // The left operand of each "," is evaluated purely for side effect.
    fn comma(&mut self) -> Result<Expr, ParseError> {
        self.check_missing_left(&[TokenType::Comma], Self::assignment)?;
        let mut expr = self.assignment()?;
        while self.check(TokenType::Comma) {
            let operator = self.advance().clone();
            let right = self.assignment()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    // assignment -> ( call "." )? identifier "=" assignment | ternary
    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.ternary()?;

        if self.check(TokenType::Equal) {
            let equals = self.advance().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: next_expr_id(),
                    name,
                    value: Box::new(value),
                }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),
                _ => {
                    // Non-fatal: the right-hand side already parsed.
                    let err = ParseError::at(&equals, "Invalid assignment target.");
                    self.errors.push(err);
                    Ok(value)
                }
            };
        }

        Ok(expr)
    }

    // ternary -> or ( "?" expression ":" ternary )?
    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let expr = self.or()?;

        if self.check(TokenType::Question) {
            self.advance();
            self.enter_depth()?;
            let true_branch = self.expression();
            self.exit_depth();
            let true_branch = true_branch?;
            self.expect(TokenType::Colon, "Expect ':' in a ternary operator expression.")?;
            let false_branch = self.ternary()?;
            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                true_branch: Box::new(true_branch),
                false_branch: Box::new(false_branch),
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;
        while self.check(TokenType::Or) {
            let operator = self.advance().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.check(TokenType::And) {
            let operator = self.advance().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    // equality -> comparison ( ( "!=" | "==" ) comparison )*
    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_production(
            &[TokenType::BangEqual, TokenType::EqualEqual],
            Self::comparison,
            true,
        )
    }

    // comparison -> term ( ( ">" | ">=" | "<" | "<=" ) term )*
    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_production(
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            Self::term,
            true,
        )
    }

    // term -> factor ( ( "-" | "+" ) factor )*
    //
    // No missing-left detection here: a leading "-" is a valid unary.
    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_production(&[TokenType::Minus, TokenType::Plus], Self::factor, false)
    }

    // factor -> unary ( ( "/" | "*" ) unary )*
    fn factor(&mut self) -> Result<Expr, ParseError> {
        self.binary_production(&[TokenType::Slash, TokenType::Star], Self::unary, true)
    }

    /// Shared production template for left-associative binary operator
    /// chains. With `detect_missing_left`, an operator in prefix position is
    /// reported as a missing left operand (its right operand is still parsed
    /// and discarded).
    fn binary_production(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
        detect_missing_left: bool,
    ) -> Result<Expr, ParseError> {
        if detect_missing_left {
            self.check_missing_left(operators, next)?;
        }

        let mut expr = next(self)?;
        while operators.iter().any(|&tt| self.check(tt)) {
            let operator = self.advance().clone();
            let right = next(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn check_missing_left(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<(), ParseError> {
        if operators.iter().any(|&tt| self.check(tt)) {
            let operator = self.advance().clone();
            next(self)?;
            return Err(ParseError::at(&operator, "Missing left operand."));
        }
        Ok(())
    }

    // unary -> ( "!" | "-" ) unary | call
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenType::Bang) || self.check(TokenType::Minus) {
            let operator = self.advance().clone();
            self.enter_depth()?;
            let right = self.unary();
            self.exit_depth();
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right?),
            });
        }
        self.call()
    }

    // call -> primary ( "(" arguments? ")" | "." identifier )*
    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.check(TokenType::LeftParen) {
                self.advance();
                expr = self.finish_call(expr)?;
            } else if self.check(TokenType::Dot) {
                self.advance();
                let name = self
                    .expect(TokenType::Identifier, "Expect property name after '.'.")?
                    .clone();
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    // arguments -> assignment ( "," assignment )*
    //
    // Arguments sit below the comma operator, so "," separates them.
    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let err = ParseError::at(self.current(), "Can't have more than 255 arguments.");
                    self.errors.push(err);
                }
                arguments.push(self.assignment()?);
                if !self.check(TokenType::Comma) {
                    break;
                }
                self.advance();
            }
        }

        let paren = self
            .expect(TokenType::RightParen, "Expect ')' after arguments.")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    // primary -> "false" | "true" | "nil" | number | string | "(" expression ")"
    //          | identifier | "this" | "super" "." identifier | lambda
    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.current().token_type {
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal {
                    value: LiteralValue::Bool(false),
                })
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal {
                    value: LiteralValue::Bool(true),
                })
            }
            TokenType::Nil => {
                self.advance();
                Ok(Expr::Literal {
                    value: LiteralValue::Nil,
                })
            }
            TokenType::Number => {
                let token = self.advance();
                let value = match &token.literal {
                    Some(TokenLiteral::Number(n)) => *n,
                    _ => 0.0,
                };
                Ok(Expr::Literal {
                    value: LiteralValue::Number(value),
                })
            }
            TokenType::Str => {
                let token = self.advance();
                let value = match &token.literal {
                    Some(TokenLiteral::Str(s)) => s.clone(),
                    _ => String::new(),
                };
                Ok(Expr::Literal {
                    value: LiteralValue::Str(value),
                })
            }
            TokenType::LeftParen => {
                self.advance();
                let expression = self.expression()?;
                self.expect(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expr::Grouping {
                    expression: Box::new(expression),
                })
            }
            TokenType::Identifier => {
                let name = self.advance().clone();
                Ok(Expr::Variable {
                    id: next_expr_id(),
                    name,
                })
            }
            TokenType::This => {
                let keyword = self.advance().clone();
                Ok(Expr::This {
                    id: next_expr_id(),
                    keyword,
                })
            }
            TokenType::Super => {
                let keyword = self.advance().clone();
                self.expect(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self
                    .expect(TokenType::Identifier, "Expect superclass method name.")?
                    .clone();
                Ok(Expr::Super {
                    id: next_expr_id(),
                    keyword,
                    method,
                })
            }
            TokenType::Fun => {
                self.advance();
                self.lambda()
            }
            _ => Err(ParseError::at(self.current(), "Expect expression.")),
        }
    }

    // lambda -> "fun" "(" parameters? ")" block
    fn lambda(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenType::LeftParen, "Expect '(' after 'fun'.")?;
        let params = self.parameters()?;
        self.expect(TokenType::LeftBrace, "Expect '{' before lambda body.")?;
        let body = self.block_statements()?;
        Ok(Expr::Lambda {
            params: Rc::new(params),
            body: Rc::new(body),
        })
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn enter_depth(&mut self) -> Result<(), ParseError> {
        // Refusing to enter leaves the counter untouched, so after the
        // error synchronizes the parser starts the next statement at the
        // depth it actually is.
        if self.depth >= MAX_PARSER_DEPTH {
            return Err(ParseError::at(
                self.current(),
                "Expression is too deeply nested.",
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn exit_depth(&mut self) {
        self.depth -= 1;
    }

    fn expect(&mut self, token_type: TokenType, message: &str) -> Result<&Token, ParseError> {
        if self.check(token_type) {
            return Ok(self.advance());
        }
        Err(ParseError::at(self.current(), message))
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.at_end() && self.current().token_type == token_type
    }

    fn check_next(&self, token_type: TokenType) -> bool {
        self.tokens
            .get(self.pos + 1)
            .is_some_and(|t| t.token_type == token_type)
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos - 1]
    }

    fn at_end(&self) -> bool {
        self.current().token_type == TokenType::Eof
    }
}
