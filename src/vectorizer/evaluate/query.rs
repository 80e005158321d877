use std::fmt::{self, Display};

use crate::error::{Complexity, QueryParseError};

/// Longest query accepted, counted after lexing
pub const MAX_QUERY_TOKENS: usize = 1024;
/// Deepest parenthesis nesting accepted by the parser
pub const MAX_PAREN_DEPTH: usize = 32;
/// Deepest expression tree accepted for normalization
pub const MAX_EXPR_DEPTH: usize = 128;

/// Boolean query expression tree
///
/// Leaves are terms exactly as they were given, or the constants `TRUE` and
/// `FALSE`. `And` / `Or` hold any number of operands and are kept flat, so a
/// long chain of one operator is a single wide node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Term(Box<str>),
    Const(bool),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Conjunction of `operands`, nested conjunctions merged into it
    pub fn all(operands: Vec<Expr>) -> Expr {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.swap_remove(0),
            _ => Expr::And(flat),
        }
    }

    /// Disjunction of `operands`, nested disjunctions merged into it
    pub fn any(operands: Vec<Expr>) -> Expr {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.swap_remove(0),
            _ => Expr::Or(flat),
        }
    }

    /// Negation, `~~x` collapses to `x`
    pub fn negate(self) -> Expr {
        match self {
            Expr::Not(inner) => *inner,
            Expr::Const(value) => Expr::Const(!value),
            other => Expr::Not(Box::new(other)),
        }
    }

    /// Height of the tree, a single leaf is 1
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((expr, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            match expr {
                Expr::Term(_) | Expr::Const(_) => {}
                Expr::Not(inner) => stack.push((inner.as_ref(), depth + 1)),
                Expr::And(operands) | Expr::Or(operands) => {
                    stack.extend(operands.iter().map(|e| (e, depth + 1)));
                }
            }
        }
        deepest
    }
}

fn join(f: &mut fmt::Formatter<'_>, operands: &[Expr], op: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", operand)?;
    }
    write!(f, ")")
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Term(term) => write!(f, "{}", term),
            Expr::Const(true) => write!(f, "TRUE"),
            Expr::Const(false) => write!(f, "FALSE"),
            Expr::And(operands) if operands.is_empty() => write!(f, "TRUE"),
            Expr::Or(operands) if operands.is_empty() => write!(f, "FALSE"),
            Expr::Not(inner) => write!(f, "~({})", inner),
            Expr::And(operands) => join(f, operands, "&"),
            Expr::Or(operands) => join(f, operands, "|"),
        }
    }
}

/// Builders for hand-written expressions
pub mod q {
    use super::Expr;

    pub fn term(term: &str) -> Expr {
        Expr::Term(Box::from(term))
    }

    pub fn constant(value: bool) -> Expr {
        Expr::Const(value)
    }

    pub fn not(expr: Expr) -> Expr {
        expr.negate()
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::all(vec![left, right])
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::any(vec![left, right])
    }
}

/// Lexical token of a boolean query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Literal(String),
    True,
    False,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl QueryToken {
    /// Map an input token to an operator, a constant or a literal.
    /// `AND`/`OR`/`NOT`/`TRUE`/`FALSE` are reserved words matched
    /// case-insensitively, `&`, `|`, `~` are accepted as the symbolic
    /// operators. Anything else is a literal, kept as given.
    fn classify(raw: &str) -> Self {
        match raw {
            "&" => return QueryToken::And,
            "|" => return QueryToken::Or,
            "~" => return QueryToken::Not,
            "(" => return QueryToken::LParen,
            ")" => return QueryToken::RParen,
            _ => {}
        }
        if raw.eq_ignore_ascii_case("and") {
            QueryToken::And
        } else if raw.eq_ignore_ascii_case("or") {
            QueryToken::Or
        } else if raw.eq_ignore_ascii_case("not") {
            QueryToken::Not
        } else if raw.eq_ignore_ascii_case("true") {
            QueryToken::True
        } else if raw.eq_ignore_ascii_case("false") {
            QueryToken::False
        } else {
            QueryToken::Literal(raw.to_string())
        }
    }

    fn ends_operand(&self) -> bool {
        matches!(self, QueryToken::Literal(_) | QueryToken::True | QueryToken::False | QueryToken::RParen)
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self,
            QueryToken::Literal(_) | QueryToken::True | QueryToken::False | QueryToken::LParen | QueryToken::Not
        )
    }
}

impl Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryToken::Literal(lit) => write!(f, "{}", lit),
            QueryToken::True => write!(f, "TRUE"),
            QueryToken::False => write!(f, "FALSE"),
            QueryToken::And => write!(f, "&"),
            QueryToken::Or => write!(f, "|"),
            QueryToken::Not => write!(f, "~"),
            QueryToken::LParen => write!(f, "("),
            QueryToken::RParen => write!(f, ")"),
        }
    }
}

/// Reserved word for a constant, `None` for anything else
pub fn constant_of(word: &str) -> Option<bool> {
    match QueryToken::classify(word) {
        QueryToken::True => Some(true),
        QueryToken::False => Some(false),
        _ => None,
    }
}

const SYMBOLS: [char; 5] = ['(', ')', '&', '|', '~'];

/// Split a raw query string on whitespace and operator symbols.
///
/// This is plain lexing for symbolic input such as a rendered DNF, not
/// linguistic tokenization.
pub fn split_query(query: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in query.split_whitespace() {
        split_symbols(word, &mut out);
    }
    out
}

fn split_symbols(word: &str, out: &mut Vec<String>) {
    let mut buf = String::new();
    for c in word.chars() {
        if SYMBOLS.contains(&c) {
            if !buf.is_empty() {
                out.push(std::mem::take(&mut buf));
            }
            out.push(c.to_string());
        } else {
            buf.push(c);
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
}

/// Turn an input token sequence into query tokens with explicit operators.
///
/// Symbols glued to words (`(cat`, `~dog`) are split off. An `&` is inserted
/// wherever an operand end (literal, constant or `)`) is directly followed by
/// an operand start (literal, constant, `(` or `NOT`).
///
/// # Returns
/// * `Vec<(usize, QueryToken)>` - tokens with the index of the input token they came from
pub fn lex<T>(tokens: &[T]) -> Vec<(usize, QueryToken)>
where
    T: AsRef<str>,
{
    let mut out: Vec<(usize, QueryToken)> = Vec::with_capacity(tokens.len());
    let mut pieces = Vec::new();
    for (position, raw) in tokens.iter().enumerate() {
        pieces.clear();
        split_symbols(raw.as_ref().trim(), &mut pieces);
        for piece in &pieces {
            let token = QueryToken::classify(piece);
            if let Some((_, prev)) = out.last() {
                if prev.ends_operand() && token.starts_operand() {
                    out.push((position, QueryToken::And));
                }
            }
            out.push((position, token));
        }
    }
    out
}

/// Recursive descent parser
/// precedence: NOT > AND > OR
///
/// ```text
/// or   := and ( OR and )*
/// and  := not ( AND not )*
/// not  := NOT* atom
/// atom := LITERAL | TRUE | FALSE | '(' or ')'
/// ```
///
/// Operator chains are collected in loops, only parentheses recurse and
/// their nesting is capped at `MAX_PAREN_DEPTH`.
struct Parser<'a> {
    tokens: &'a [(usize, QueryToken)],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a (usize, QueryToken)> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a (usize, QueryToken)> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self, depth: usize) -> Result<Expr, QueryParseError> {
        let mut operands = vec![self.parse_and(depth)?];
        while let Some((_, QueryToken::Or)) = self.peek() {
            self.pos += 1;
            operands.push(self.parse_and(depth)?);
        }
        Ok(Expr::any(operands))
    }

    fn parse_and(&mut self, depth: usize) -> Result<Expr, QueryParseError> {
        let mut operands = vec![self.parse_not(depth)?];
        while let Some((_, QueryToken::And)) = self.peek() {
            self.pos += 1;
            operands.push(self.parse_not(depth)?);
        }
        Ok(Expr::all(operands))
    }

    fn parse_not(&mut self, depth: usize) -> Result<Expr, QueryParseError> {
        // NOT の連続は偶奇だけ見る
        let mut negate = false;
        while let Some((_, QueryToken::Not)) = self.peek() {
            self.pos += 1;
            negate = !negate;
        }
        let atom = self.parse_atom(depth)?;
        Ok(if negate { atom.negate() } else { atom })
    }

    fn parse_atom(&mut self, depth: usize) -> Result<Expr, QueryParseError> {
        match self.next() {
            None => Err(QueryParseError::UnexpectedEnd),
            Some((_, QueryToken::Literal(lit))) => Ok(Expr::Term(Box::from(lit.as_str()))),
            Some((_, QueryToken::True)) => Ok(Expr::Const(true)),
            Some((_, QueryToken::False)) => Ok(Expr::Const(false)),
            Some((open, QueryToken::LParen)) => {
                if depth >= MAX_PAREN_DEPTH {
                    return Err(QueryParseError::too_complex(Complexity::Depth, MAX_PAREN_DEPTH));
                }
                let inner = self.parse_or(depth + 1)?;
                match self.next() {
                    Some((_, QueryToken::RParen)) => Ok(inner),
                    None => Err(QueryParseError::UnbalancedParen { position: *open }),
                    Some((position, token)) => Err(QueryParseError::UnexpectedToken {
                        position: *position,
                        token: token.to_string(),
                    }),
                }
            }
            Some((position, QueryToken::RParen)) => Err(QueryParseError::UnbalancedParen { position: *position }),
            Some((position, token)) => Err(QueryParseError::UnexpectedToken {
                position: *position,
                token: token.to_string(),
            }),
        }
    }
}

/// Parse a boolean token sequence into an expression tree.
///
/// # Returns
/// * `Ok(None)` - the query has no tokens
/// * `Ok(Some(expr))` - parsed expression
/// * `Err(_)` - malformed operator or parenthesis sequence, or a query longer
///   than `MAX_QUERY_TOKENS` or nested deeper than `MAX_PAREN_DEPTH`
pub fn parse<T>(tokens: &[T]) -> Result<Option<Expr>, QueryParseError>
where
    T: AsRef<str>,
{
    let lexed = lex(tokens);
    if lexed.is_empty() {
        return Ok(None);
    }
    if lexed.len() > MAX_QUERY_TOKENS {
        return Err(QueryParseError::too_complex(Complexity::Tokens, MAX_QUERY_TOKENS));
    }
    let mut parser = Parser { tokens: &lexed, pos: 0 };
    let expr = parser.parse_or(0)?;
    match parser.next() {
        None => Ok(Some(expr)),
        Some((position, QueryToken::RParen)) => Err(QueryParseError::UnbalancedParen { position: *position }),
        Some((position, token)) => Err(QueryParseError::UnexpectedToken {
            position: *position,
            token: token.to_string(),
        }),
    }
}
