//! Parser for the SQL subset understood by the in-memory store.
//!
//! ```text
//! SELECT [TOP n] (* | VALUE expr | expr [AS name], ...)
//! FROM alias
//! [WHERE expr]
//! [ORDER BY expr [ASC | DESC]]
//! ```
//!
//! Expressions combine paths (`r.items[0].product_id`), literals, `@parameters`, comparisons,
//! `AND` / `OR` / `NOT`, built-in functions and `EXISTS(SELECT VALUE x FROM x IN path WHERE ...)`.

use serde_json::{Number, Value};
use std::{collections::HashSet, iter::Peekable, str::CharIndices};
use thiserror::Error;

use cosmosdal_core::error::StoreError;

/// Errors raised while parsing or binding a query. The store reports them as status 400.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Syntax error, unexpected end of query.")]
    UnexpectedEnd,
    #[error("Syntax error, incorrect syntax near '{0}' at position {1}.")]
    UnexpectedToken(String, usize),
    #[error("Syntax error, unterminated string literal at position {0}.")]
    UnterminatedString(usize),
    #[error("Syntax error, invalid character '{0}' at position {1}.")]
    InvalidCharacter(char, usize),
    #[error("Syntax error, invalid number '{0}'.")]
    InvalidNumber(String),
    #[error("Identifier '{0}' could not be resolved.")]
    UnresolvedIdentifier(String),
    #[error("The query parameter {0} is not declared.")]
    UndeclaredParameter(String),
    #[error("'{0}' is not a recognized built-in function name.")]
    UnknownFunction(String),
    #[error("The {0} function requires {1} argument(s).")]
    Arity(&'static str, &'static str),
}

impl From<QueryError> for StoreError {
    fn from(err: QueryError) -> Self {
        StoreError::bad_request(err.to_string())
    }
}

pub(crate) type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    IsDefined,
    StartsWith,
    EndsWith,
    Contains,
    ArrayContains,
    Lower,
    Upper,
}

impl Function {
    fn from_name(name: &str) -> QueryResult<Self> {
        Ok(match name.to_ascii_uppercase().as_str() {
            "IS_DEFINED" => Function::IsDefined,
            "STARTSWITH" => Function::StartsWith,
            "ENDSWITH" => Function::EndsWith,
            "CONTAINS" => Function::Contains,
            "ARRAY_CONTAINS" => Function::ArrayContains,
            "LOWER" => Function::Lower,
            "UPPER" => Function::Upper,
            _ => return Err(QueryError::UnknownFunction(name.to_string())),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Function::IsDefined => "IS_DEFINED",
            Function::StartsWith => "STARTSWITH",
            Function::EndsWith => "ENDSWITH",
            Function::Contains => "CONTAINS",
            Function::ArrayContains => "ARRAY_CONTAINS",
            Function::Lower => "LOWER",
            Function::Upper => "UPPER",
        }
    }

    fn check_arity(&self, count: usize) -> QueryResult<()> {
        let (accepted, expected) = match self {
            Function::IsDefined | Function::Lower | Function::Upper => (count == 1, "1"),
            Function::StartsWith
            | Function::EndsWith
            | Function::Contains
            | Function::ArrayContains => ((2..=3).contains(&count), "2 or 3"),
        };

        if accepted {
            Ok(())
        } else {
            Err(QueryError::Arity(self.name(), expected))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Field(String),
    Index(usize),
}

/// A property path rooted at an alias, e.g. `r.items[0].product_id`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Path {
    pub root: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Parameter(String),
    Path(Path),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    Exists(Box<SubQuery>),
}

/// `SELECT VALUE expr FROM alias IN source [WHERE filter]`, used inside `EXISTS`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubQuery {
    /// `None` for `SELECT *`.
    pub value: Option<Expr>,
    pub alias: String,
    pub source: Expr,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Value(Expr),
    Fields(Vec<(Expr, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderBy {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectQuery {
    pub top: Option<usize>,
    pub projection: Projection,
    pub alias: String,
    pub filter: Option<Expr>,
    pub order_by: Option<OrderBy>,
}

impl SelectQuery {
    pub(crate) fn parse(source: &str) -> QueryResult<Self> {
        let mut parser = Parser::new(tokenize(source)?);
        let query = parser.select()?;

        match parser.next_token() {
            Some((token, position)) => Err(QueryError::UnexpectedToken(token.to_string(), position)),
            None => Ok(query),
        }
    }

    /// Checks that every identifier resolves to an alias in scope and every parameter is
    /// declared.
    pub(crate) fn bind<'p>(&self, parameters: impl IntoIterator<Item = &'p str>) -> QueryResult<()> {
        let mut binder = Binder {
            scopes: vec![self.alias.clone()],
            parameters: parameters.into_iter().collect(),
        };

        match &self.projection {
            Projection::All => {}
            Projection::Value(expr) => binder.visit_expr(expr)?,
            Projection::Fields(fields) => {
                for (expr, _) in fields {
                    binder.visit_expr(expr)?;
                }
            }
        }
        if let Some(filter) = &self.filter {
            binder.visit_expr(filter)?;
        }
        if let Some(order_by) = &self.order_by {
            binder.visit_expr(&order_by.expr)?;
        }

        Ok(())
    }
}

/// Walks an expression tree. Mirrors the shape of [`Expr`].
pub(crate) trait ExprVisitor {
    type Output;
    type Error;

    fn visit_literal(&mut self, value: &Value) -> Result<Self::Output, Self::Error>;
    fn visit_parameter(&mut self, name: &str) -> Result<Self::Output, Self::Error>;
    fn visit_path(&mut self, path: &Path) -> Result<Self::Output, Self::Error>;
    fn visit_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_call(&mut self, function: Function, args: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, subquery: &SubQuery) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::Literal(value) => self.visit_literal(value),
            Expr::Parameter(name) => self.visit_parameter(name),
            Expr::Path(path) => self.visit_path(path),
            Expr::Binary { op, left, right } => self.visit_binary(*op, left, right),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Call { function, args } => self.visit_call(*function, args),
            Expr::Exists(subquery) => self.visit_exists(subquery),
        }
    }
}

struct Binder<'p> {
    scopes: Vec<String>,
    parameters: HashSet<&'p str>,
}

impl ExprVisitor for Binder<'_> {
    type Output = ();
    type Error = QueryError;

    fn visit_literal(&mut self, _value: &Value) -> QueryResult<()> {
        Ok(())
    }

    fn visit_parameter(&mut self, name: &str) -> QueryResult<()> {
        if self.parameters.contains(name) {
            Ok(())
        } else {
            Err(QueryError::UndeclaredParameter(name.to_string()))
        }
    }

    fn visit_path(&mut self, path: &Path) -> QueryResult<()> {
        if self.scopes.contains(&path.root) {
            Ok(())
        } else {
            Err(QueryError::UnresolvedIdentifier(path.root.clone()))
        }
    }

    fn visit_binary(&mut self, _op: BinaryOp, left: &Expr, right: &Expr) -> QueryResult<()> {
        self.visit_expr(left)?;
        self.visit_expr(right)
    }

    fn visit_not(&mut self, expr: &Expr) -> QueryResult<()> {
        self.visit_expr(expr)
    }

    fn visit_call(&mut self, _function: Function, args: &[Expr]) -> QueryResult<()> {
        args.iter().try_for_each(|arg| self.visit_expr(arg))
    }

    fn visit_exists(&mut self, subquery: &SubQuery) -> QueryResult<()> {
        self.visit_expr(&subquery.source)?;

        self.scopes.push(subquery.alias.clone());
        let inner = subquery
            .filter
            .iter()
            .chain(subquery.value.iter())
            .try_for_each(|expr| self.visit_expr(expr));
        self.scopes.pop();

        inner
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Param(String),
    Symbol(&'static str),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(text) | Token::Number(text) | Token::Param(text) => f.write_str(text),
            Token::Str(text) => write!(f, "'{text}'"),
            Token::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

const KEYWORDS: [&str; 18] = [
    "SELECT", "TOP", "VALUE", "FROM", "IN", "WHERE", "ORDER", "BY", "ASC", "DESC", "AND", "OR",
    "NOT", "EXISTS", "AS", "TRUE", "FALSE", "NULL",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(source: &str) -> QueryResult<Vec<(Token, usize)>> {
    let mut chars: Peekable<CharIndices<'_>> = source.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, escaped)) => text.push(escaped),
                            None => return Err(QueryError::UnterminatedString(start)),
                        },
                        Some((_, ch)) if ch == c => break,
                        Some((_, ch)) => text.push(ch),
                        None => return Err(QueryError::UnterminatedString(start)),
                    }
                }
                Token::Str(text)
            }
            '@' => {
                chars.next();
                let mut name = String::from("@");
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_identifier_char(ch) {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                if name.len() == 1 {
                    return Err(QueryError::InvalidCharacter('@', start));
                }
                Token::Param(name)
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !(ch.is_ascii_alphanumeric() || ch == '.') {
                        break;
                    }
                    text.push(ch);
                    chars.next();
                    // Signed exponent, e.g. 1e-3.
                    if matches!(ch, 'e' | 'E') {
                        if let Some(&(_, sign @ ('+' | '-'))) = chars.peek() {
                            text.push(sign);
                            chars.next();
                        }
                    }
                }
                Token::Number(text)
            }
            c if is_identifier_char(c) => {
                let mut text = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_identifier_char(ch) {
                        break;
                    }
                    text.push(ch);
                    chars.next();
                }
                Token::Ident(text)
            }
            _ => {
                chars.next();
                let next = chars.peek().map(|&(_, ch)| ch);
                let symbol = match (c, next) {
                    ('!', Some('=')) => "!=",
                    ('<', Some('>')) => "<>",
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('(', _) => "(",
                    (')', _) => ")",
                    ('[', _) => "[",
                    (']', _) => "]",
                    (',', _) => ",",
                    ('.', _) => ".",
                    ('*', _) => "*",
                    ('=', _) => "=",
                    ('<', _) => "<",
                    ('>', _) => ">",
                    ('-', _) => "-",
                    _ => return Err(QueryError::InvalidCharacter(c, start)),
                };
                if symbol.len() == 2 {
                    chars.next();
                }
                Token::Symbol(symbol)
            }
        };

        tokens.push((token, start));
    }

    Ok(tokens)
}

fn parse_number(text: &str, negative: bool) -> QueryResult<Value> {
    let invalid = || QueryError::InvalidNumber(text.to_string());

    if text.contains(['.', 'e', 'E']) {
        let value: f64 = text.parse().map_err(|_| invalid())?;
        let value = if negative { -value } else { value };
        Number::from_f64(value).map(Value::Number).ok_or_else(invalid)
    } else {
        let value: i64 = text.parse().map_err(|_| invalid())?;
        Ok(Value::from(if negative { -value } else { value }))
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self { tokens, position: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn next_token(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn unexpected(&mut self) -> QueryError {
        match self.next_token() {
            Some((token, position)) => QueryError::UnexpectedToken(token.to_string(), position),
            None => QueryError::UnexpectedEnd,
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.peek_keyword(keyword);
        if found {
            self.position += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> QueryResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let found = matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol);
        if found {
            self.position += 1;
        }
        found
    }

    fn expect_symbol(&mut self, symbol: &str) -> QueryResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn identifier(&mut self) -> QueryResult<String> {
        match self.peek() {
            Some(Token::Ident(word)) if !is_keyword(word) => {
                let word = word.clone();
                self.position += 1;
                Ok(word)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn select(&mut self) -> QueryResult<SelectQuery> {
        self.expect_keyword("SELECT")?;

        let top = if self.eat_keyword("TOP") {
            match self.next_token() {
                Some((Token::Number(text), _)) => {
                    Some(text.parse().map_err(|_| QueryError::InvalidNumber(text))?)
                }
                Some((token, position)) => {
                    return Err(QueryError::UnexpectedToken(token.to_string(), position));
                }
                None => return Err(QueryError::UnexpectedEnd),
            }
        } else {
            None
        };

        let projection = if self.eat_symbol("*") {
            Projection::All
        } else if self.eat_keyword("VALUE") {
            Projection::Value(self.expr()?)
        } else {
            let mut fields = Vec::new();
            loop {
                let expr = self.expr()?;
                let name = if self.eat_keyword("AS") {
                    self.identifier()?
                } else {
                    match &expr {
                        Expr::Path(Path { segments, .. }) => match segments.last() {
                            Some(Segment::Field(field)) => field.clone(),
                            _ => format!("${}", fields.len() + 1),
                        },
                        _ => format!("${}", fields.len() + 1),
                    }
                };
                fields.push((expr, name));

                if !self.eat_symbol(",") {
                    break;
                }
            }
            Projection::Fields(fields)
        };

        self.expect_keyword("FROM")?;
        let alias = self.identifier()?;

        let filter = if self.eat_keyword("WHERE") {
            Some(self.expr()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let expr = self.expr()?;
            let direction = if self.eat_keyword("DESC") {
                SortDirection::Desc
            } else {
                self.eat_keyword("ASC");
                SortDirection::Asc
            };
            Some(OrderBy { expr, direction })
        } else {
            None
        };

        Ok(SelectQuery {
            top,
            projection,
            alias,
            filter,
            order_by,
        })
    }

    fn subquery(&mut self) -> QueryResult<SubQuery> {
        self.expect_keyword("SELECT")?;

        let value = if self.eat_symbol("*") {
            None
        } else {
            self.expect_keyword("VALUE")?;
            Some(self.expr()?)
        };

        self.expect_keyword("FROM")?;
        let alias = self.identifier()?;
        self.expect_keyword("IN")?;
        let source = self.expr()?;

        let filter = if self.eat_keyword("WHERE") {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(SubQuery {
            value,
            alias,
            source,
            filter,
        })
    }

    fn expr(&mut self) -> QueryResult<Expr> {
        self.or()
    }

    fn or(&mut self) -> QueryResult<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("OR") {
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(self.and()?),
            };
        }
        Ok(left)
    }

    fn and(&mut self) -> QueryResult<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("AND") {
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(self.not()?),
            };
        }
        Ok(left)
    }

    fn not(&mut self) -> QueryResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> QueryResult<Expr> {
        let left = self.primary()?;

        let op = match self.peek() {
            Some(Token::Symbol("=")) => BinaryOp::Eq,
            Some(Token::Symbol("!=")) | Some(Token::Symbol("<>")) => BinaryOp::Ne,
            Some(Token::Symbol("<")) => BinaryOp::Lt,
            Some(Token::Symbol("<=")) => BinaryOp::Le,
            Some(Token::Symbol(">")) => BinaryOp::Gt,
            Some(Token::Symbol(">=")) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.position += 1;

        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(self.primary()?),
        })
    }

    fn primary(&mut self) -> QueryResult<Expr> {
        match self.next_token() {
            Some((Token::Number(text), _)) => Ok(Expr::Literal(parse_number(&text, false)?)),
            Some((Token::Symbol("-"), position)) => match self.next_token() {
                Some((Token::Number(text), _)) => Ok(Expr::Literal(parse_number(&text, true)?)),
                _ => Err(QueryError::UnexpectedToken("-".to_string(), position)),
            },
            Some((Token::Str(text), _)) => Ok(Expr::Literal(Value::String(text))),
            Some((Token::Param(name), _)) => Ok(Expr::Parameter(name)),
            Some((Token::Symbol("("), _)) => {
                let expr = self.expr()?;
                self.expect_symbol(")")?;
                Ok(expr)
            }
            Some((Token::Ident(word), position)) => {
                if word.eq_ignore_ascii_case("TRUE") {
                    Ok(Expr::Literal(Value::Bool(true)))
                } else if word.eq_ignore_ascii_case("FALSE") {
                    Ok(Expr::Literal(Value::Bool(false)))
                } else if word.eq_ignore_ascii_case("NULL") {
                    Ok(Expr::Literal(Value::Null))
                } else if word.eq_ignore_ascii_case("EXISTS") {
                    self.expect_symbol("(")?;
                    let subquery = self.subquery()?;
                    self.expect_symbol(")")?;
                    Ok(Expr::Exists(Box::new(subquery)))
                } else if is_keyword(&word) {
                    Err(QueryError::UnexpectedToken(word, position))
                } else if self.eat_symbol("(") {
                    self.call(&word)
                } else {
                    self.path(word)
                }
            }
            Some((token, position)) => Err(QueryError::UnexpectedToken(token.to_string(), position)),
            None => Err(QueryError::UnexpectedEnd),
        }
    }

    fn call(&mut self, name: &str) -> QueryResult<Expr> {
        let function = Function::from_name(name)?;
        let mut args = Vec::new();

        if !self.eat_symbol(")") {
            loop {
                args.push(self.expr()?);
                if self.eat_symbol(")") {
                    break;
                }
                self.expect_symbol(",")?;
            }
        }

        function.check_arity(args.len())?;
        Ok(Expr::Call { function, args })
    }

    fn path(&mut self, root: String) -> QueryResult<Expr> {
        let mut segments = Vec::new();

        loop {
            if self.eat_symbol(".") {
                match self.next_token() {
                    Some((Token::Ident(field), _)) => segments.push(Segment::Field(field)),
                    Some((token, position)) => {
                        return Err(QueryError::UnexpectedToken(token.to_string(), position));
                    }
                    None => return Err(QueryError::UnexpectedEnd),
                }
            } else if self.eat_symbol("[") {
                match self.next_token() {
                    Some((Token::Number(text), _)) => segments.push(Segment::Index(
                        text.parse().map_err(|_| QueryError::InvalidNumber(text))?,
                    )),
                    Some((Token::Str(field), _)) => segments.push(Segment::Field(field)),
                    Some((token, position)) => {
                        return Err(QueryError::UnexpectedToken(token.to_string(), position));
                    }
                    None => return Err(QueryError::UnexpectedEnd),
                }
                self.expect_symbol("]")?;
            } else {
                return Ok(Expr::Path(Path { root, segments }));
            }
        }
    }
}
