use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::ast::{BlockStatement, Expression, Program, Statement};

/// Binding powers, lowest first. `parse_expression` climbs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,      // == !=
    LessGreater, // < >
    Sum,         // + -
    Product,     // * /
    Prefix,      // !x -x
    Call,        // f(x)
    Index,       // a[0]
}

fn precedence_of(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Asterisk | Token::Slash => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Sentinel returned when a cursor helper runs past the token list.
static EOF: Token = Token::Eof;

/// Pratt parser for Cinder.
///
/// The parser consumes the lexer's spanned token stream and produces a
/// `Program`. Errors do not abort parsing: they accumulate in `errors` and
/// the parser resynchronizes at the next statement, so one pass can report
/// several problems. Callers must check `errors()` before trusting the
/// returned AST.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    errors: Vec<ParserError>,
}

impl Parser {
    /// Creates a parser over lexer output. The stream is expected to end
    /// with `Token::Eof` (the lexer guarantees this).
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Lexes and parses in one step.
    pub fn parse_source(source: &str) -> Result<Program, Vec<ParserError>> {
        let tokens = match crate::frontend::lexer::Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                return Err(vec![ParserError {
                    message: e.message,
                    line: e.line,
                    col: e.col,
                }]);
            }
        };

        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();
        if parser.errors.is_empty() {
            Ok(program)
        } else {
            Err(parser.errors)
        }
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).map(|s| &s.token).unwrap_or(&EOF)
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|s| &s.token)
            .unwrap_or(&EOF)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|s| s.span.clone())
            .unwrap_or(Span { line: 1, col: 1 })
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos + 1)
            .map(|s| s.span.clone())
            .unwrap_or_else(|| self.current_span())
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn current_is(&self, token: &Token) -> bool {
        self.current() == token
    }

    fn peek_is(&self, token: &Token) -> bool {
        self.peek() == token
    }

    /// If the next token is `expected`, consumes it and returns true.
    /// Otherwise records an error and leaves the position untouched.
    fn expect_peek(&mut self, expected: &Token) -> bool {
        if self.peek_is(expected) {
            self.advance();
            true
        } else {
            let span = self.peek_span();
            self.errors.push(ParserError {
                message: format!(
                    "expected next token to be {}, got {} instead",
                    expected,
                    self.peek()
                ),
                line: span.line,
                col: span.col,
            });
            false
        }
    }

    fn error_at_current(&mut self, message: String) {
        let span = self.current_span();
        self.errors.push(ParserError {
            message,
            line: span.line,
            col: span.col,
        });
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while !self.current_is(&Token::Eof) {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.advance();
        }

        Program { statements }
    }

    /// Parses one statement. On success the position rests on the
    /// statement's final token (the caller advances past it).
    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current() {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        let name = match self.peek() {
            Token::Ident(name) => name.clone(),
            _ => {
                let got = self.peek().to_string();
                let span = self.peek_span();
                self.errors.push(ParserError {
                    message: format!("expected next token to be an identifier, got {} instead", got),
                    line: span.line,
                    col: span.col,
                });
                return None;
            }
        };
        self.advance();

        if !self.expect_peek(&Token::Assign) {
            return None;
        }
        self.advance();

        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(&Token::Semicolon) {
            self.advance();
        }

        Some(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        // `return;` and `return` at the end of a block carry no value
        if self.peek_is(&Token::Semicolon) {
            self.advance();
            return Some(Statement::Return(None));
        }
        if self.peek_is(&Token::RBrace) || self.peek_is(&Token::Eof) {
            return Some(Statement::Return(None));
        }

        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(&Token::Semicolon) {
            self.advance();
        }

        Some(Statement::Return(Some(value)))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(&Token::Semicolon) {
            self.advance();
        }

        Some(Statement::Expression(expression))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(&Token::Semicolon) && precedence < precedence_of(self.peek()) {
            left = match self.peek() {
                Token::Plus
                | Token::Minus
                | Token::Asterisk
                | Token::Slash
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Gt => {
                    self.advance();
                    self.parse_infix_expression(left)?
                }
                Token::LParen => {
                    self.advance();
                    self.parse_call_expression(left)?
                }
                Token::LBracket => {
                    self.advance();
                    self.parse_index_expression(left)?
                }
                _ => break,
            };
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.current().clone() {
            Token::Ident(name) => Some(Expression::Identifier(name)),
            Token::Int(value) => Some(Expression::IntegerLiteral(value)),
            Token::Float(value) => Some(Expression::FloatLiteral(value)),
            Token::Str(value) => Some(Expression::StringLiteral(value)),
            Token::True => Some(Expression::BooleanLiteral(true)),
            Token::False => Some(Expression::BooleanLiteral(false)),
            Token::Bang | Token::Minus => self.parse_prefix_expression(),
            Token::LParen => self.parse_grouped_expression(),
            Token::If => self.parse_if_expression(),
            Token::Function => self.parse_function_literal(),
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_hash_literal(),
            other => {
                self.error_at_current(format!("no prefix parse rule for {} found", other));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let operator = self.current().to_string();
        self.advance();
        let right = self.parse_expression(Precedence::Prefix)?;

        Some(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = self.current().to_string();
        let precedence = precedence_of(self.current());
        self.advance();
        let right = self.parse_expression(precedence)?;

        Some(Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.advance();
        let expression = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(&Token::RParen) {
            return None;
        }

        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        if !self.expect_peek(&Token::LParen) {
            return None;
        }
        self.advance();

        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(&Token::RParen) {
            return None;
        }
        if !self.expect_peek(&Token::LBrace) {
            return None;
        }

        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_is(&Token::Else) {
            self.advance();
            if !self.expect_peek(&Token::LBrace) {
                return None;
            }
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// Parses `{ statements }`. Enters with the position on `{`, leaves
    /// with it on `}`.
    fn parse_block_statement(&mut self) -> Option<BlockStatement> {
        let mut statements = Vec::new();
        self.advance();

        while !self.current_is(&Token::RBrace) {
            if self.current_is(&Token::Eof) {
                self.error_at_current("unexpected EOF, expected }".to_string());
                return None;
            }
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.advance();
        }

        Some(BlockStatement { statements })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(&Token::LParen) {
            return None;
        }

        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(&Token::LBrace) {
            return None;
        }

        let body = self.parse_block_statement()?;

        Some(Expression::FunctionLiteral { parameters, body })
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        let mut parameters = Vec::new();

        if self.peek_is(&Token::RParen) {
            self.advance();
            return Some(parameters);
        }

        self.advance();
        parameters.push(self.parse_parameter_name()?);

        while self.peek_is(&Token::Comma) {
            self.advance();
            self.advance();
            parameters.push(self.parse_parameter_name()?);
        }

        if !self.expect_peek(&Token::RParen) {
            return None;
        }

        Some(parameters)
    }

    fn parse_parameter_name(&mut self) -> Option<String> {
        match self.current() {
            Token::Ident(name) => Some(name.clone()),
            other => {
                let message = format!("expected parameter name, got {} instead", other);
                self.error_at_current(message);
                None
            }
        }
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let arguments = self.parse_expression_list(&Token::RParen)?;

        Some(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let elements = self.parse_expression_list(&Token::RBracket)?;
        Some(Expression::ArrayLiteral(elements))
    }

    fn parse_expression_list(&mut self, end: &Token) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.peek_is(end) {
            self.advance();
            return Some(list);
        }

        self.advance();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(&Token::Comma) {
            self.advance();
            self.advance();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }

        Some(list)
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();

        while !self.peek_is(&Token::RBrace) {
            self.advance();
            let key = self.parse_expression(Precedence::Lowest)?;

            if !self.expect_peek(&Token::Colon) {
                return None;
            }
            self.advance();

            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(&Token::RBrace) && !self.expect_peek(&Token::Comma) {
                return None;
            }
        }

        if !self.expect_peek(&Token::RBrace) {
            return None;
        }

        Some(Expression::HashLiteral(pairs))
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        self.advance();
        let index = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(&Token::RBracket) {
            return None;
        }

        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }
}
