//! Recursive-descent parser for condition expressions
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, equality, comparison,
//! additive, multiplicative, unary, postfix (member, index, call).

use serde_json::Value;

use super::lexer::Token;

/// Deepest syntax tree the parser will build
pub const MAX_DEPTH: usize = 256;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression syntax tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Undefined,
    Variable(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Parse a token stream into a single expression
pub fn parse(tokens: &[Token]) -> Result<Expr, String> {
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected token '{}'", token)),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Upper bound on the depth of the tree being built
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.advance() {
            Some(token) if *token == expected => Ok(()),
            Some(token) => Err(format!("expected '{}' but found '{}'", expected, token)),
            None => Err(format!("expected '{}' but reached end of input", expected)),
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("expression nested too deeply (limit {})", MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn conditional(&mut self) -> Result<Expr, String> {
        self.enter()?;
        let expr = self.ternary();
        self.leave(1);
        expr
    }

    fn ternary(&mut self) -> Result<Expr, String> {
        let test = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let then = self.conditional()?;
        self.expect(Token::Colon)?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise)))
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        let mut links = 0;
        while self.eat(&Token::Or) {
            self.enter()?;
            links += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.leave(links);
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.equality()?;
        let mut links = 0;
        while self.eat(&Token::And) {
            self.enter()?;
            links += 1;
            let right = self.equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.leave(links);
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, String> {
        let mut left = self.comparison()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::LooseEq) => BinaryOp::LooseEq,
                Some(Token::LooseNe) => BinaryOp::LooseNe,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNe) => BinaryOp::StrictNe,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave(links);
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let mut left = self.additive()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave(links);
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        let mut left = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave(links);
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave(links);
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        let op = if self.eat(&Token::Not) {
            UnaryOp::Not
        } else if self.eat(&Token::Minus) {
            UnaryOp::Neg
        } else {
            return self.postfix();
        };
        self.enter()?;
        let operand = self.unary();
        self.leave(1);
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if matches!(self.peek(), Some(Token::Dot | Token::LBracket | Token::LParen)) {
                self.enter()?;
                links += 1;
            }
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Member(Box::new(expr), name.clone());
                    }
                    Some(token) => return Err(format!("expected property name after '.', found '{}'", token)),
                    None => return Err("expected property name after '.'".to_string()),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.conditional()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == Some(&Token::LParen) {
                let name = match &expr {
                    Expr::Variable(name) => name.clone(),
                    _ => return Err("only named helper functions can be called".to_string()),
                };
                self.pos += 1;
                let args = self.arguments()?;
                expr = Expr::Call(name, args);
            } else {
                self.leave(links);
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.conditional()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(super::number(*n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s.clone()))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Undefined,
                _ => Expr::Variable(name.clone()),
            }),
            Some(Token::LParen) => {
                let expr = self.conditional()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(format!("unexpected token '{}'", token)),
            None => Err("unexpected end of input".to_string()),
        }
    }
}
