//! Recursive-descent parser for compiled program source.
//!
//! Accepts the subset of script syntax the compiler emits plus what a
//! custom victory predicate reasonably uses: object literals, `===`, and
//! single-quoted strings.

use crate::ast::{BinaryOp, Expr, Function, LogicalOp, Program, Stmt, UnaryOp};
use crate::error::RuntimeError;
use crate::lexer::{tokenize, Token, TokenKind};

/// Parses a whole program.
pub fn parse_program(source: &str) -> Result<Program, RuntimeError> {
    let mut parser = Parser::new(source)?;
    let mut program = Program::default();
    while !parser.at_eof() {
        if parser.at_keyword("function") || (parser.at_keyword("async") && parser.peek_keyword(1, "function")) {
            let function = parser.function()?;
            if program.functions.contains_key(&function.name) {
                return Err(parser.error(format!("duplicate function {}", function.name)));
            }
            program.functions.insert(function.name.clone(), function);
        } else {
            program.body.push(parser.statement()?);
        }
    }
    Ok(program)
}

/// Parses a single expression, such as a victory predicate.
pub fn parse_expression(source: &str) -> Result<Expr, RuntimeError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.eat_punct(";");
    if !parser.at_eof() {
        return Err(parser.error("unexpected input after expression"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loop_depth: usize,
    in_function: bool,
}

impl Parser {
    fn new(source: &str) -> Result<Self, RuntimeError> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
            loop_depth: 0,
            in_function: false,
        })
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek_keyword(0, word)
    }

    fn peek_keyword(&self, offset: usize, word: &str) -> bool {
        matches!(self.peek_kind_at(offset), TokenKind::Ident(w) if w == word)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), RuntimeError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{p}`")))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), RuntimeError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{word}`")))
        }
    }

    fn ident(&mut self) -> Result<String, RuntimeError> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Str(s) => format!("{s:?}"),
            TokenKind::Ident(w) => w.clone(),
            TokenKind::Punct(p) => p.to_string(),
            TokenKind::Eof => "end of input".to_string(),
        };
        RuntimeError::Parse {
            line: token.line,
            col: token.col,
            message: format!("{}, found {found}", message.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Declarations and statements
    // -----------------------------------------------------------------------

    fn function(&mut self) -> Result<Function, RuntimeError> {
        let is_async = self.eat_keyword("async");
        self.expect_keyword("function")?;
        let name = self.ident()?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.at_punct(")") {
            loop {
                params.push(self.ident()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;

        let outer = (self.in_function, self.loop_depth);
        self.in_function = true;
        self.loop_depth = 0;
        let body = self.block();
        (self.in_function, self.loop_depth) = outer;

        Ok(Function {
            name,
            params,
            is_async,
            body: body?,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.error("expected `}`"));
            }
            stmts.push(self.statement()?);
        }
        self.expect_punct("}")?;
        Ok(stmts)
    }

    fn loop_block(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body
    }

    fn statement(&mut self) -> Result<Stmt, RuntimeError> {
        if self.eat_keyword("let") || self.eat_keyword("var") || self.eat_keyword("const") {
            let stmt = self.declaration()?;
            self.expect_punct(";")?;
            return Ok(stmt);
        }
        if self.eat_keyword("if") {
            return self.if_statement();
        }
        if self.eat_keyword("while") {
            self.expect_punct("(")?;
            let cond = self.expression()?;
            self.expect_punct(")")?;
            let body = self.loop_block()?;
            return Ok(Stmt::While { cond, body });
        }
        if self.eat_keyword("for") {
            return self.for_statement();
        }
        if self.eat_keyword("return") {
            if !self.in_function {
                return Err(self.error("return outside a function"));
            }
            let value = if self.at_punct(";") || self.at_punct("}") {
                None
            } else {
                Some(self.expression()?)
            };
            self.eat_punct(";");
            return Ok(Stmt::Return(value));
        }
        if self.at_keyword("break") || self.at_keyword("continue") {
            if self.loop_depth == 0 {
                return Err(self.error("loop control outside a loop"));
            }
            let stmt = if self.eat_keyword("break") {
                Stmt::Break
            } else {
                self.advance();
                Stmt::Continue
            };
            self.expect_punct(";")?;
            return Ok(stmt);
        }
        let stmt = self.simple_statement()?;
        self.expect_punct(";")?;
        Ok(stmt)
    }

    /// `name (= expr)?` after `let`.
    fn declaration(&mut self) -> Result<Stmt, RuntimeError> {
        let name = self.ident()?;
        let init = if self.eat_punct("=") {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Stmt::Let { name, init })
    }

    /// Assignment or bare expression, without the trailing `;`.
    fn simple_statement(&mut self) -> Result<Stmt, RuntimeError> {
        let expr = self.expression()?;
        if self.eat_punct("=") {
            if !expr.is_assignable() {
                return Err(self.error("invalid assignment target"));
            }
            let value = self.expression()?;
            return Ok(Stmt::Assign { target: expr, value });
        }
        Ok(Stmt::Expr(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt, RuntimeError> {
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let then = self.block()?;
        let otherwise = if self.eat_keyword("else") {
            if self.eat_keyword("if") {
                vec![self.if_statement()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn for_statement(&mut self) -> Result<Stmt, RuntimeError> {
        self.expect_punct("(")?;

        let declares = self.at_keyword("let") || self.at_keyword("var") || self.at_keyword("const");
        let var_offset = usize::from(declares);
        if self.peek_keyword(var_offset + 1, "of") {
            if declares {
                self.advance();
            }
            let var = self.ident()?;
            self.expect_keyword("of")?;
            let iterable = self.expression()?;
            self.expect_punct(")")?;
            let body = self.loop_block()?;
            return Ok(Stmt::ForOf { var, iterable, body });
        }

        let init = if self.at_punct(";") {
            None
        } else if self.eat_keyword("let") || self.eat_keyword("var") || self.eat_keyword("const") {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(self.simple_statement()?))
        };
        self.expect_punct(";")?;
        let cond = if self.at_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") {
            None
        } else {
            Some(Box::new(self.simple_statement()?))
        };
        self.expect_punct(")")?;
        let body = self.loop_block()?;
        Ok(Stmt::For { init, cond, update, body })
    }

    // -----------------------------------------------------------------------
    // Expressions, lowest precedence first
    // -----------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, RuntimeError> {
        self.logical_or()
    }

    fn logical_or(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.logical_and()?;
        while self.eat_punct("||") {
            let rhs = self.logical_and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.equality()?;
        while self.eat_punct("&&") {
            let rhs = self.equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, RuntimeError>,
    ) -> Result<Expr, RuntimeError> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (symbol, op) in ops {
                if self.eat_punct(symbol) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn equality(&mut self) -> Result<Expr, RuntimeError> {
        self.binary_level(&[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)], Self::relational)
    }

    fn relational(&mut self) -> Result<Expr, RuntimeError> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, RuntimeError> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, RuntimeError> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, RuntimeError> {
        if self.eat_punct("!") {
            let expr = self.unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) });
        }
        if self.eat_punct("-") {
            let expr = self.unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr) });
        }
        if self.eat_keyword("await") {
            let expr = self.unary()?;
            return Ok(Expr::Await(Box::new(expr)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, RuntimeError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct("(") {
                let args = self.arguments(")")?;
                expr = Expr::Call { callee: Box::new(expr), args };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
            } else if self.eat_punct(".") {
                let name = match &self.peek().kind {
                    TokenKind::Ident(name) => name.clone(),
                    _ => return Err(self.error("expected property name")),
                };
                self.advance();
                expr = Expr::Member { object: Box::new(expr), name };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self, close: &str) -> Result<Vec<Expr>, RuntimeError> {
        let mut args = Vec::new();
        if !self.at_punct(close) {
            loop {
                args.push(self.expression()?);
                if !self.eat_punct(",") || self.at_punct(close) {
                    break;
                }
            }
        }
        self.expect_punct(close)?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, RuntimeError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Text(s))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" | "undefined" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                _ => Ok(Expr::Ident(self.ident()?)),
            },
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                self.advance();
                Ok(Expr::List(self.arguments("]")?))
            }
            TokenKind::Punct("{") => {
                self.advance();
                self.object_literal()
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, RuntimeError> {
        let mut entries = Vec::new();
        while !self.at_punct("}") {
            let key = match &self.peek().kind {
                TokenKind::Ident(name) => name.clone(),
                TokenKind::Str(s) => s.clone(),
                TokenKind::Number(n) => crate::value::Value::Number(*n).to_string(),
                _ => return Err(self.error("expected property key")),
            };
            self.advance();
            self.expect_punct(":")?;
            entries.push((key, self.expression()?));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Map(entries))
    }
}

const KEYWORDS: &[&str] = &[
    "async", "await", "break", "const", "continue", "else", "false", "for", "function", "if",
    "let", "null", "of", "return", "true", "undefined", "var", "while",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}
