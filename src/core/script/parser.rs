use super::lexer::{Spanned, Token};
use super::ScriptError;

/// 括號、一元運算與二元運算鏈共用的深度上限
const MAX_NESTING: usize = 128;
const MAX_STATEMENT_TOKENS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    List(Vec<Expr>),
    Name(String),
    Attribute(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Assign(String, Expr),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

pub fn parse(tokens: Vec<Spanned>) -> Result<Vec<Statement>, ScriptError> {
    let mut run = 0;
    for spanned in &tokens {
        if spanned.token == Token::Separator {
            run = 0;
            continue;
        }
        run += 1;
        if run > MAX_STATEMENT_TOKENS {
            return Err(ScriptError::new(
                spanned.line,
                format!("statement exceeds {} tokens", MAX_STATEMENT_TOKENS),
            ));
        }
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ScriptError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", what, describe(self.peek()))))
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::new(self.line(), message)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == word)
    }

    fn program(&mut self) -> Result<Vec<Statement>, ScriptError> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Separator) {}
            if *self.peek() == Token::Eof {
                break;
            }
            statements.push(self.statement()?);
            match self.peek() {
                Token::Separator | Token::Eof => {}
                other => {
                    return Err(self.error(format!(
                        "expected end of statement, found {}",
                        describe(other)
                    )))
                }
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, ScriptError> {
        let line = self.line();
        if let (Token::Ident(name), Token::Assign) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            if is_reserved(&name) {
                return Err(self.error(format!("cannot assign to '{}'", name)));
            }
            self.pos += 2;
            let value = self.expression()?;
            return Ok(Statement {
                line,
                kind: StatementKind::Assign(name, value),
            });
        }
        let expr = self.expression()?;
        Ok(Statement {
            line,
            kind: StatementKind::Expr(expr),
        })
    }

    /// 每多一層語法樹就呼叫一次，離開時由呼叫端扣回
    fn descend(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression is nested too deeply"));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.descend()?;
        let result = self.or_expr();
        self.depth -= 1;
        result
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.and_expr()?;
        let mut levels = 0;
        while self.is_keyword("or") {
            self.pos += 1;
            self.descend()?;
            levels += 1;
            let right = self.and_expr()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        self.depth -= levels;
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.not_expr()?;
        let mut levels = 0;
        while self.is_keyword("and") {
            self.pos += 1;
            self.descend()?;
            levels += 1;
            let right = self.not_expr()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        self.depth -= levels;
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        if self.is_keyword("not") {
            self.pos += 1;
            self.descend()?;
            let inner = self.not_expr()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::LtEq => BinaryOp::LtEq,
            Token::Gt => BinaryOp::Gt,
            Token::GtEq => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.term()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            levels += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth -= levels;
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            levels += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth -= levels;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Token::Minus) {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(match inner {
                Expr::Number(n) => Expr::Number(-n),
                other => Expr::Negate(Box::new(other)),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        let mut levels = 0;
        loop {
            if matches!(self.peek(), Token::LParen | Token::LBracket | Token::Dot) {
                self.descend()?;
                levels += 1;
            }
            match self.peek() {
                Token::LParen => {
                    let Expr::Name(name) = expr else {
                        return Err(self.error("only named functions can be called"));
                    };
                    self.pos += 1;
                    let args = self.arguments(&Token::RParen, "')'")?;
                    expr = Expr::Call(name, args);
                }
                Token::LBracket => {
                    self.pos += 1;
                    let index = self.expression()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::Dot => {
                    self.pos += 1;
                    match self.advance() {
                        Token::Ident(attr) => expr = Expr::Attribute(Box::new(expr), attr),
                        other => {
                            return Err(self.error(format!(
                                "expected a column name after '.', found {}",
                                describe(&other)
                            )))
                        }
                    }
                }
                _ => break,
            }
        }
        self.depth -= levels;
        Ok(expr)
    }

    fn arguments(&mut self, close: &Token, what: &str) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(&Token::Comma, &format!("',' or {}", what))?;
            // 允許尾隨逗號
            if self.eat(close) {
                return Ok(args);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" | "True" => Expr::Bool(true),
                "false" | "False" => Expr::Bool(false),
                "null" | "None" => Expr::Null,
                "and" | "or" | "not" => {
                    self.pos -= 1;
                    return Err(self.error(format!("unexpected keyword '{}'", name)));
                }
                _ => Expr::Name(name),
            }),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => {
                let items = self.arguments(&Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "df" | "true" | "false" | "null" | "True" | "False" | "None" | "and" | "or" | "not"
    )
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Ident(name) => format!("'{}'", name),
        Token::Separator => "end of line".to_string(),
        Token::Eof => "end of script".to_string(),
        other => format!("'{}'", symbol(other)),
    }
}

fn symbol(token: &Token) -> &'static str {
    match token {
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::Comma => ",",
        Token::Dot => ".",
        Token::Assign => "=",
        Token::Eq => "==",
        Token::NotEq => "!=",
        Token::Lt => "<",
        Token::LtEq => "<=",
        Token::Gt => ">",
        Token::GtEq => ">=",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::lexer::tokenize;

    fn parse_source(source: &str) -> Result<Vec<Statement>, ScriptError> {
        parse(tokenize(source)?)
    }

    #[test]
    fn test_precedence() {
        let statements = parse_source("x = 1 + 2 * 3").unwrap();
        let StatementKind::Assign(name, expr) = &statements[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        assert_eq!(
            *expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0))
                ))
            )
        );
    }

    #[test]
    fn test_postfix_chain_and_lines() {
        let statements = parse_source("a = 1\n\nprint(df[\"amountUSD\"][0], df.id)").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].line, 3);
        assert!(matches!(
            &statements[1].kind,
            StatementKind::Expr(Expr::Call(name, args)) if name == "print" && args.len() == 2
        ));
    }

    #[test]
    fn test_logical_operators() {
        let statements = parse_source("m = not a > 1 and b < 2 or c").unwrap();
        let StatementKind::Assign(_, Expr::Binary(op, _, _)) = &statements[0].kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_source("x = 1\ny = (2 + ").unwrap_err();
        assert_eq!(err.line, 2);

        let err = parse_source("df = 1").unwrap_err();
        assert!(err.message.contains("cannot assign"));

        assert!(parse_source("x = 1 2").is_err());
        assert!(parse_source("[1](0)").is_err());
    }

    #[test]
    fn test_deep_expressions_are_rejected() {
        let err = parse_source(&format!("x = {}1", "-".repeat(200_000))).unwrap_err();
        assert!(err.message.contains("exceeds 4096 tokens"));

        let err = parse_source(&format!("x = {}1", "-".repeat(500))).unwrap_err();
        assert!(err.message.contains("nested too deeply"));

        let err = parse_source(&format!("x = {}true", "not ".repeat(500))).unwrap_err();
        assert!(err.message.contains("nested too deeply"));

        let chain = vec!["1"; 1000].join(" + ");
        let err = parse_source(&format!("x = {}", chain)).unwrap_err();
        assert!(err.message.contains("nested too deeply"));

        let err = parse_source(&format!("x = {}1{}", "(".repeat(200), ")".repeat(200))).unwrap_err();
        assert!(err.message.contains("nested too deeply"));

        let err = parse_source(&format!("x = df.id{}", "[0]".repeat(1000))).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_moderate_chains_still_parse() {
        let chain = vec!["df.amountUSD"; 50].join(" + ");
        assert!(parse_source(&format!("x = {}", chain)).is_ok());
        assert!(parse_source("x = --1 * -(2 + 3)").is_ok());
    }
}
