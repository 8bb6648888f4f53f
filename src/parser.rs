use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Script, Stmt, StmtKind, UnaryOp},
    diagnostics::{NuwaError, Position, Result},
    lexer::{self, Keyword, Token, TokenKind},
    value::Value,
};

pub fn parse(source: &str) -> Result<Script> {
    let tokens = lexer::tokenize(source)?;
    parse_tokens(tokens)
}

pub fn parse_tokens(tokens: Vec<Token>) -> Result<Script> {
    Parser::new(tokens).parse_script()
}

/// Parses a single expression; trailing tokens are an error.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    if !parser.is_at_end() {
        return Err(parser.error(parser.peek(), "Expected end of expression"));
    }
    Ok(expr)
}

/// Deepest tree the parser builds. Bounds the recursion of parsing,
/// evaluation, printing and drop for any input text.
pub const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|tok| tok.kind) != Some(TokenKind::Eof) {
            let position = tokens
                .last()
                .map(|tok| tok.position)
                .unwrap_or(Position::new(1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                position,
            });
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    fn parse_script(&mut self) -> Result<Script> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(Script { statements })
    }

    /// Statements up to (not including) one of `terminators`.
    fn parse_block_items(&mut self, terminators: &[Keyword], context: &str) -> Result<Vec<Stmt>> {
        let mut items = Vec::new();
        loop {
            if terminators.iter().any(|kw| self.check_keyword(*kw)) {
                return Ok(items);
            }
            if self.is_at_end() {
                let expected = terminators
                    .iter()
                    .map(|kw| kw.as_str())
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.error(self.peek(), &format!("Expected {expected} to close {context}")));
            }
            items.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Let) => self.parse_let(),
            TokenKind::Keyword(Keyword::Call) => self.parse_call_statement(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let(&mut self) -> Result<Stmt> {
        let position = self.consume_keyword(Keyword::Let)?.position;
        let name = self.consume_identifier("Expected variable name after LET")?;
        self.consume(TokenKind::Assign, "Expected '=' after variable name")?;
        let value = self.parse_expression()?;
        Ok(Stmt {
            position,
            kind: StmtKind::Let {
                name: name.lexeme,
                value,
            },
        })
    }

    fn parse_call_statement(&mut self) -> Result<Stmt> {
        let position = self.consume_keyword(Keyword::Call)?.position;
        let (tool, args) = self.parse_tool_invocation()?;
        Ok(Stmt {
            position,
            kind: StmtKind::Call { tool, args },
        })
    }

    /// Tool name plus `{ name: expr, ... }`, after the `CALL` keyword.
    fn parse_tool_invocation(&mut self) -> Result<(String, IndexMap<String, Expr>)> {
        let tool = self.consume_identifier("Expected tool name after CALL")?;
        self.consume(TokenKind::LBrace, "Expected '{' to start tool arguments")?;
        let mut args = IndexMap::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let name = self.consume_identifier("Expected argument name")?;
                self.consume(TokenKind::Colon, "Expected ':' after argument name")?;
                let value = self.parse_expression()?;
                // Repeated names keep the last value.
                args.insert(name.lexeme, value);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' to close tool arguments")?;
        Ok((tool.lexeme, args))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let position = self.consume_keyword(Keyword::If)?.position;
        let condition = self.parse_expression()?;
        self.consume_keyword(Keyword::Then)?;
        let then_branch =
            self.nested(|p| p.parse_block_items(&[Keyword::Else, Keyword::End], "IF"))?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(self.nested(|p| p.parse_block_items(&[Keyword::End], "ELSE"))?)
        } else {
            None
        };
        self.consume_keyword(Keyword::End)?;
        Ok(Stmt {
            position,
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let position = self.consume_keyword(Keyword::For)?.position;
        let binding = self.consume_identifier("Expected loop variable after FOR")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_expression()?;
        self.consume_keyword(Keyword::Do)?;
        let body = self.nested(|p| p.parse_block_items(&[Keyword::End], "FOR"))?;
        self.consume_keyword(Keyword::End)?;
        Ok(Stmt {
            position,
            kind: StmtKind::For {
                binding: binding.lexeme,
                iterable,
                body,
            },
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.parse_expression()?;
        Ok(Stmt {
            position: expr.position,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.nested(Self::parse_or)
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr, position: Position) -> Expr {
        Expr {
            position,
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;
        while self.matches_keyword(Keyword::Or) {
            let position = self.previous().position;
            let right = self.parse_and()?;
            expr = self.bounded(Self::binary(BinaryOp::Or, expr, right, position))?;
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_equality()?;
        while self.matches_keyword(Keyword::And) {
            let position = self.previous().position;
            let right = self.parse_equality()?;
            expr = self.bounded(Self::binary(BinaryOp::And, expr, right, position))?;
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = if self.matches(TokenKind::EqualEqual) {
            Some(BinaryOp::Equal)
        } else if self.matches(TokenKind::BangEqual) {
            Some(BinaryOp::NotEqual)
        } else {
            None
        } {
            let position = self.previous().position;
            let right = self.parse_comparison()?;
            expr = self.bounded(Self::binary(op, expr, right, position))?;
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_term()?;
        while let Some(op) = if self.matches(TokenKind::LessEqual) {
            Some(BinaryOp::LessEqual)
        } else if self.matches(TokenKind::GreaterEqual) {
            Some(BinaryOp::GreaterEqual)
        } else if self.matches(TokenKind::Less) {
            Some(BinaryOp::Less)
        } else if self.matches(TokenKind::Greater) {
            Some(BinaryOp::Greater)
        } else {
            None
        } {
            let position = self.previous().position;
            let right = self.parse_term()?;
            expr = self.bounded(Self::binary(op, expr, right, position))?;
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = if self.matches(TokenKind::Plus) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenKind::Minus) {
            Some(BinaryOp::Sub)
        } else {
            None
        } {
            let position = self.previous().position;
            let right = self.parse_factor()?;
            expr = self.bounded(Self::binary(op, expr, right, position))?;
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = if self.matches(TokenKind::Star) {
            Some(BinaryOp::Mul)
        } else if self.matches(TokenKind::Slash) {
            Some(BinaryOp::Div)
        } else if self.matches(TokenKind::Percent) {
            Some(BinaryOp::Mod)
        } else {
            None
        } {
            let position = self.previous().position;
            let right = self.parse_unary()?;
            expr = self.bounded(Self::binary(op, expr, right, position))?;
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Keyword(Keyword::Not) => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        let position = self.advance().position;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr {
            position,
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LBracket) {
                let position = self.previous().position;
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after index")?;
                expr = self.bounded(Expr {
                    position,
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                })?;
            } else if self.matches(TokenKind::Dot) {
                let position = self.previous().position;
                let property = self.consume_identifier("Expected property name after '.'")?;
                expr = self.bounded(Expr {
                    position,
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        property: property.lexeme,
                    },
                })?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let literal = |value: Value| Expr {
            position: token.position,
            kind: ExprKind::Literal(value),
        };
        match token.kind {
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(literal(Value::Bool(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(literal(Value::Bool(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(literal(Value::Null))
            }
            TokenKind::Number => {
                self.advance();
                let number = token
                    .lexeme
                    .parse::<f64>()
                    .map_err(|_| self.error(&token, "Invalid number literal"))?;
                Ok(literal(Value::Number(number)))
            }
            TokenKind::String => {
                self.advance();
                Ok(literal(Value::String(token.lexeme.clone())))
            }
            TokenKind::Keyword(Keyword::Now) => {
                self.advance();
                self.consume(TokenKind::LParen, "Expected '(' after NOW")?;
                self.consume(TokenKind::RParen, "NOW takes no arguments, expected ')'")?;
                Ok(Expr {
                    position: token.position,
                    kind: ExprKind::FunctionCall {
                        name: "NOW".to_string(),
                        args: Vec::new(),
                    },
                })
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.advance();
                self.consume(TokenKind::LParen, "Expected '(' after PRINT")?;
                let args = self.parse_call_arguments()?;
                Ok(Expr {
                    position: token.position,
                    kind: ExprKind::FunctionCall {
                        name: "PRINT".to_string(),
                        args,
                    },
                })
            }
            TokenKind::Identifier => {
                self.advance();
                if self.matches(TokenKind::LParen) {
                    let args = self.parse_call_arguments()?;
                    Ok(Expr {
                        position: token.position,
                        kind: ExprKind::FunctionCall {
                            name: token.lexeme,
                            args,
                        },
                    })
                } else {
                    Ok(Expr {
                        position: token.position,
                        kind: ExprKind::Variable(token.lexeme),
                    })
                }
            }
            TokenKind::Keyword(Keyword::Call) => {
                self.advance();
                let (tool, args) = self.parse_tool_invocation()?;
                Ok(Expr {
                    position: token.position,
                    kind: ExprKind::ToolCall { tool, args },
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "Expected ')' after expression")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Eof => Err(self.error(&token, "Unexpected end of input, expected an expression")),
            _ => Err(self.error(&token, "Expected an expression")),
        }
    }

    /// Arguments after an opening `(`, through the closing `)`.
    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_list_literal(&mut self) -> Result<Expr> {
        let position = self.consume(TokenKind::LBracket, "Expected '['")?.position;
        let mut elements = Vec::new();
        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RBracket, "Expected ']' after list elements")?;
        Ok(Expr {
            position,
            kind: ExprKind::ListLiteral(elements),
        })
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        let position = self.consume(TokenKind::LBrace, "Expected '{'")?.position;
        let mut properties = IndexMap::new();
        while !self.check(TokenKind::RBrace) {
            let key = match self.peek().kind {
                TokenKind::Identifier | TokenKind::String => self.advance().lexeme,
                _ => {
                    return Err(self.error(
                        self.peek(),
                        "Expected property name (identifier or string)",
                    ))
                }
            };
            self.consume(TokenKind::Colon, "Expected ':' after property name")?;
            let value = self.parse_expression()?;
            properties.insert(key, value);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after object properties")?;
        Ok(Expr {
            position,
            kind: ExprKind::ObjectLiteral(properties),
        })
    }

    /// Runs `parse` one level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.too_deep(self.peek()));
        }
        let base = self.depth;
        self.depth += 1;
        let result = parse(self);
        self.depth = base;
        result
    }

    /// Operator chains and postfix accessors grow the tree without recursing,
    /// so their height is checked when each node is built.
    fn bounded(&self, expr: Expr) -> Result<Expr> {
        if self.depth + height(&expr) > MAX_NESTING {
            return Err(self.too_deep(self.previous()));
        }
        Ok(expr)
    }

    fn too_deep(&self, token: &Token) -> NuwaError {
        self.error(
            token,
            &format!("Expression nested too deeply (maximum depth is {MAX_NESTING})"),
        )
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token> {
        let message = format!("Expected {}", keyword.as_str());
        self.consume(TokenKind::Keyword(keyword), &message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token> {
        self.consume(TokenKind::Identifier, message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.check(TokenKind::Keyword(keyword))
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&self, token: &Token, message: &str) -> NuwaError {
        NuwaError::Parser {
            message: message.to_string(),
            found: token.describe(),
            position: token.position,
        }
    }
}

fn height(expr: &Expr) -> usize {
    let children = match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Variable(_) => 0,
        ExprKind::Binary { left, right, .. } => height(left).max(height(right)),
        ExprKind::Unary { operand, .. } => height(operand),
        ExprKind::FunctionCall { args, .. } => args.iter().map(height).max().unwrap_or(0),
        ExprKind::ToolCall { args, .. } => args.values().map(height).max().unwrap_or(0),
        ExprKind::ListLiteral(items) => items.iter().map(height).max().unwrap_or(0),
        ExprKind::ObjectLiteral(properties) => {
            properties.values().map(height).max().unwrap_or(0)
        }
        ExprKind::Index { object, index } => height(object).max(height(index)),
        ExprKind::Member { object, .. } => height(object),
    };
    children + 1
}
