use std::collections::BTreeMap;
use std::fmt::{self, Display};

use ahash::{AHashMap, RandomState};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Complexity, QueryParseError};
use crate::vectorizer::evaluate::query::{self, constant_of, Expr, MAX_EXPR_DEPTH};

/// Upper bound on the number of clauses a query may expand to
pub const MAX_DNF_CLAUSES: usize = 4096;
/// Upper bound on the clause visits and comparisons one simplification may spend
pub const MAX_SIMPLIFY_STEPS: usize = 1 << 22;

/// A possibly negated query term
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub term: String,
    pub negated: bool,
}

impl Literal {
    pub fn positive<S: Into<String>>(term: S) -> Self {
        Self { term: term.into(), negated: false }
    }

    pub fn negative<S: Into<String>>(term: S) -> Self {
        Self { term: term.into(), negated: true }
    }

    /// Whether this literal holds for a document
    #[inline]
    pub fn is_satisfied_by(&self, contains_term: bool) -> bool {
        contains_term != self.negated
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "~{}", self.term)
        } else {
            write!(f, "{}", self.term)
        }
    }
}

/// Conjunction of literals, sorted and free of duplicates.
/// An empty clause is the constant true.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Clause {
    literals: Vec<Literal>,
}

impl Clause {
    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Bare terms of the clause, polarity dropped
    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.literals.iter().map(|l| l.term.as_str())
    }

    fn from_map(map: &BTreeMap<String, bool>) -> Self {
        Self {
            literals: map
                .iter()
                .map(|(term, &negated)| Literal { term: term.clone(), negated })
                .collect(),
        }
    }
}

impl FromIterator<Literal> for Clause {
    fn from_iter<I: IntoIterator<Item = Literal>>(iter: I) -> Self {
        let mut literals: Vec<Literal> = iter.into_iter().collect();
        literals.sort();
        literals.dedup();
        Self { literals }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.literals.is_empty() {
            return write!(f, "TRUE");
        }
        let parts: Vec<String> = self.literals.iter().map(|l| l.to_string()).collect();
        if parts.len() == 1 {
            write!(f, "{}", parts[0])
        } else {
            write!(f, "({})", parts.join(" & "))
        }
    }
}

/// Query in disjunctive normal form
///
/// `[[t1, t2], [t3]]` means `(t1 ∧ t2) ∨ t3`. No clauses means the query
/// matches nothing and renders as `FALSE`; a single empty clause means it
/// matches everything and renders as `TRUE`. Both words are reserved by the
/// query lexer, so a rendering parses back to the same query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnfQuery {
    clauses: Vec<Clause>,
}

impl DnfQuery {
    /// Query matching nothing
    pub fn empty() -> Self {
        Self { clauses: Vec::new() }
    }

    /// Build from clauses, sorting and removing duplicates
    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        let mut clauses = clauses;
        clauses.sort();
        clauses.dedup();
        Self { clauses }
    }

    /// Positive-only query from nested term lists, `[["cat", "dog"], ["fish"]]`
    pub fn from_terms<T>(clauses: &[Vec<T>]) -> Self
    where
        T: AsRef<str>,
    {
        Self::from_clauses(
            clauses
                .iter()
                .map(|c| c.iter().map(|t| Literal::positive(t.as_ref())).collect())
                .collect(),
        )
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// True when the query can never match
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True when the query is a tautology
    pub fn is_always_true(&self) -> bool {
        self.clauses.iter().any(|c| c.is_empty())
    }

    /// Nested term lists with negated terms prefixed by `~`
    pub fn to_term_lists(&self) -> Vec<Vec<String>> {
        self.clauses
            .iter()
            .map(|c| c.literals.iter().map(|l| l.to_string()).collect())
            .collect()
    }
}

impl Display for DnfQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "FALSE");
        }
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(" | "))
    }
}

/// Push negations down to the leaves (negation normal form)
fn push_not(expr: &Expr, negate: bool) -> Expr {
    match expr {
        Expr::Term(_) => {
            if negate {
                Expr::Not(Box::new(expr.clone()))
            } else {
                expr.clone()
            }
        }
        Expr::Const(value) => Expr::Const(*value != negate),
        Expr::Not(inner) => push_not(inner, !negate),
        Expr::And(operands) => {
            let operands = operands.iter().map(|e| push_not(e, negate)).collect();
            if negate {
                Expr::any(operands)
            } else {
                Expr::all(operands)
            }
        }
        Expr::Or(operands) => {
            let operands = operands.iter().map(|e| push_not(e, negate)).collect();
            if negate {
                Expr::all(operands)
            } else {
                Expr::any(operands)
            }
        }
    }
}

type RawClause = BTreeMap<String, bool>;

fn too_many_clauses() -> QueryParseError {
    QueryParseError::too_complex(Complexity::Clauses, MAX_DNF_CLAUSES)
}

/// Every pairwise conjunction of `left` and `right`, contradictions dropped
fn conjoin(left: &[RawClause], right: &[RawClause]) -> Result<Vec<RawClause>, QueryParseError> {
    if left.len().saturating_mul(right.len()) > MAX_DNF_CLAUSES {
        return Err(too_many_clauses());
    }
    let mut clauses = Vec::with_capacity(left.len() * right.len());
    for a in left {
        'pair: for b in right {
            let mut merged = a.clone();
            for (term, &negated) in b {
                match merged.get(term) {
                    Some(&existing) if existing != negated => continue 'pair,
                    _ => {
                        merged.insert(term.clone(), negated);
                    }
                }
            }
            clauses.push(merged);
        }
    }
    Ok(clauses)
}

/// Distribute an NNF expression into clauses.
/// Contradictory clauses (`a ∧ ¬a`) are dropped while expanding.
fn expand(expr: &Expr) -> Result<Vec<RawClause>, QueryParseError> {
    match expr {
        Expr::Term(term) => Ok(vec![RawClause::from([(term.to_string(), false)])]),
        Expr::Const(true) => Ok(vec![RawClause::new()]),
        Expr::Const(false) => Ok(Vec::new()),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Term(term) => Ok(vec![RawClause::from([(term.to_string(), true)])]),
            // NNF only leaves negations on terms
            other => expand(&push_not(other, true)),
        },
        Expr::Or(operands) => {
            let mut clauses = Vec::new();
            for operand in operands {
                clauses.extend(expand(operand)?);
                if clauses.len() > MAX_DNF_CLAUSES {
                    return Err(too_many_clauses());
                }
            }
            Ok(clauses)
        }
        Expr::And(operands) => {
            let mut clauses = vec![RawClause::new()];
            for operand in operands {
                clauses = conjoin(&clauses, &expand(operand)?)?;
                if clauses.is_empty() {
                    break;
                }
            }
            Ok(clauses)
        }
    }
}

/// `a ⊆ b`
fn is_subset(a: &RawClause, b: &RawClause) -> bool {
    a.len() <= b.len() && a.iter().all(|(term, neg)| b.get(term) == Some(neg))
}

/// If two clauses have the same terms and differ in the polarity of exactly
/// one of them, return that term.
fn adjacent_term<'a>(a: &'a RawClause, b: &RawClause) -> Option<&'a str> {
    if a.len() != b.len() {
        return None;
    }
    let mut differing = None;
    for (term, neg) in a {
        match b.get(term) {
            None => return None,
            Some(other) if other == neg => {}
            Some(_) => {
                if differing.is_some() {
                    return None;
                }
                differing = Some(term.as_str());
            }
        }
    }
    differing
}

/// Work left for one simplification
struct Budget {
    left: usize,
}

impl Budget {
    fn spend(&mut self, steps: usize) -> Result<(), QueryParseError> {
        match self.left.checked_sub(steps) {
            Some(left) => {
                self.left = left;
                Ok(())
            }
            None => Err(QueryParseError::too_complex(Complexity::Simplification, MAX_SIMPLIFY_STEPS)),
        }
    }
}

/// Absorption, `a ∨ (a ∧ b) = a`.
///
/// A clause can only be absorbed by a strictly shorter one, so shorter clauses
/// are indexed by their first literal once every longer clause is reached. A
/// subset of `c` always has its first literal in `c`.
fn absorb(
    mut clauses: Vec<RawClause>,
    hasher: &RandomState,
    budget: &mut Budget,
) -> Result<Vec<RawClause>, QueryParseError> {
    budget.spend(clauses.len())?;
    clauses.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    let mut kept: Vec<RawClause> = Vec::with_capacity(clauses.len());
    let mut by_first: AHashMap<u64, Vec<usize>> = AHashMap::new();
    let mut indexed = 0;
    for clause in clauses {
        while indexed < kept.len() && kept[indexed].len() < clause.len() {
            if let Some((term, negated)) = kept[indexed].iter().next() {
                by_first.entry(hasher.hash_one((term, negated))).or_default().push(indexed);
            }
            indexed += 1;
        }
        let mut absorbed = false;
        'scan: for literal in &clause {
            let Some(ids) = by_first.get(&hasher.hash_one(literal)) else {
                continue;
            };
            for &id in ids {
                budget.spend(1)?;
                if is_subset(&kept[id], &clause) {
                    absorbed = true;
                    break 'scan;
                }
            }
        }
        if !absorbed {
            kept.push(clause);
        }
    }
    Ok(kept)
}

/// One round of adjacency merges, `(a ∧ b) ∨ (a ∧ ¬b) = a`.
///
/// A clause's signature is the xor of its literal hashes, so the signature of
/// the clause with one literal flipped is computed without building it. Each
/// clause takes part in at most one merge per round.
///
/// # Returns
/// * the clauses after the round, and whether any merge happened
fn merge_adjacent(
    clauses: Vec<RawClause>,
    hasher: &RandomState,
    budget: &mut Budget,
) -> Result<(Vec<RawClause>, bool), QueryParseError> {
    budget.spend(clauses.len())?;
    let literal = |term: &String, negated: bool| hasher.hash_one((term, &negated));
    let signatures: Vec<u64> = clauses
        .iter()
        .map(|c| c.iter().fold(0, |acc, (term, &negated)| acc ^ literal(term, negated)))
        .collect();
    let mut by_signature: AHashMap<u64, Vec<usize>> = AHashMap::with_capacity(clauses.len());
    for (idx, signature) in signatures.iter().enumerate() {
        by_signature.entry(*signature).or_default().push(idx);
    }

    let mut used = vec![false; clauses.len()];
    let mut merged: Vec<RawClause> = Vec::new();
    for i in 0..clauses.len() {
        if used[i] {
            continue;
        }
        'literals: for (term, &negated) in &clauses[i] {
            let flipped = signatures[i] ^ literal(term, negated) ^ literal(term, !negated);
            let Some(ids) = by_signature.get(&flipped) else {
                continue;
            };
            for &j in ids {
                if j == i || used[j] {
                    continue;
                }
                budget.spend(1)?;
                if adjacent_term(&clauses[i], &clauses[j]) == Some(term.as_str()) {
                    let mut reduced = clauses[i].clone();
                    reduced.remove(term);
                    merged.push(reduced);
                    used[i] = true;
                    used[j] = true;
                    break 'literals;
                }
            }
        }
    }
    if merged.is_empty() {
        return Ok((clauses, false));
    }
    merged.extend(clauses.into_iter().zip(used).filter(|(_, used)| !used).map(|(c, _)| c));
    Ok((merged, true))
}

/// Simplify to a fixpoint:
/// - duplicate clauses removed
/// - absorption: `a ∨ (a ∧ b) = a`
/// - adjacency: `(a ∧ b) ∨ (a ∧ ¬b) = a`
///
/// Every round that merges shrinks the clause list, and the total work is
/// capped at `MAX_SIMPLIFY_STEPS`.
fn simplify(mut clauses: Vec<RawClause>) -> Result<Vec<RawClause>, QueryParseError> {
    let hasher = RandomState::new();
    let mut budget = Budget { left: MAX_SIMPLIFY_STEPS };
    let mut rounds = 0usize;
    loop {
        clauses.sort();
        clauses.dedup();
        if clauses.iter().any(|c| c.is_empty()) {
            return Ok(vec![RawClause::new()]);
        }
        clauses = absorb(clauses, &hasher, &mut budget)?;
        let (next, merged) = merge_adjacent(clauses, &hasher, &mut budget)?;
        clauses = next;
        rounds += 1;
        if !merged {
            trace!(rounds, spent = MAX_SIMPLIFY_STEPS - budget.left, "simplification done");
            clauses.sort();
            return Ok(clauses);
        }
    }
}

/// Reduce an expression to simplified DNF
///
/// # Errors
/// `TooComplex` when the tree is deeper than `MAX_EXPR_DEPTH`, expands past
/// `MAX_DNF_CLAUSES`, or needs more than `MAX_SIMPLIFY_STEPS` to simplify
pub fn expr_to_dnf(expr: &Expr) -> Result<DnfQuery, QueryParseError> {
    if expr.depth() > MAX_EXPR_DEPTH {
        return Err(QueryParseError::too_complex(Complexity::Depth, MAX_EXPR_DEPTH));
    }
    let nnf = push_not(expr, false);
    let raw = expand(&nnf)?;
    let expanded = raw.len();
    let simplified = simplify(raw)?;
    trace!(expanded, simplified = simplified.len(), "dnf simplified");
    Ok(DnfQuery::from_clauses(simplified.iter().map(Clause::from_map).collect()))
}

/// Convert a boolean token sequence into DNF
///
/// Keywords `AND`/`OR`/`NOT` become `&`/`|`/`~`, adjacent literals are joined
/// by an implicit `&`, and the result is reduced to a simplified DNF. An empty
/// query, or one that simplifies to false, yields an empty DNF. Literals are
/// kept exactly as given, documents are matched with the same tokens.
///
/// # Arguments
/// * `tokens` - already tokenized query
///
/// # Errors
/// `QueryParseError` on a malformed operator or parenthesis sequence,
/// `TooComplex` when a size bound is hit
pub fn query_to_dnf<T>(tokens: &[T]) -> Result<DnfQuery, QueryParseError>
where
    T: AsRef<str>,
{
    let dnf = match query::parse(tokens)? {
        Some(expr) => expr_to_dnf(&expr)?,
        None => DnfQuery::empty(),
    };
    debug!(clauses = dnf.len(), query = %dnf, "query normalized");
    Ok(dnf)
}

/// Split a rendered DNF expression into clauses.
///
/// The expression is split on `|` into clauses and each clause on `&` into
/// literals, with parentheses and whitespace stripped. A leading `~` marks a
/// negated literal. The reserved words `TRUE` and `FALSE` are read the way the
/// query lexer reads them: `TRUE` drops out of its clause, `FALSE` drops the
/// whole clause. An empty string is the empty DNF.
///
/// # Errors
/// `QueryParseError::UnexpectedToken` when a literal is empty or still holds
/// an operator symbol, meaning the input was not in DNF.
pub fn dnf_to_clauses(expression: &str) -> Result<DnfQuery, QueryParseError> {
    let stripped: String = expression
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect();
    if stripped.is_empty() {
        return Ok(DnfQuery::empty());
    }
    let mut clauses = Vec::new();
    'clauses: for (position, conjunction) in stripped.split('|').enumerate() {
        let mut literals = Vec::new();
        for piece in conjunction.split('&') {
            let (negated, term) = match piece.strip_prefix('~') {
                Some(rest) => (true, rest),
                None => (false, piece),
            };
            if term.is_empty() || term.contains(['~', '&', '|']) {
                return Err(QueryParseError::UnexpectedToken {
                    position,
                    token: piece.to_string(),
                });
            }
            match constant_of(term) {
                Some(value) if value != negated => {}
                Some(_) => continue 'clauses,
                None => literals.push(Literal { term: term.to_string(), negated }),
            }
        }
        clauses.push(literals.into_iter().collect());
    }
    Ok(DnfQuery::from_clauses(clauses))
}
