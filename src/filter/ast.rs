//! Filter Expression Tree
//!
//! A filter is a predicate over a single dimension value (a subject or a
//! group-by value). Leaves compare the value against string operands;
//! `And`, `Or` and `Not` compose them.
//!
//! # JSON form
//!
//! ```text
//! "acme"                                   equality shorthand
//! {"$in": ["acme", "globex"]}
//! {"$and": [{"$like": "eu-%"}, {"$ne": "eu-west-2"}]}
//! {"$not": {"$match": "^test-"}}
//! ```

use regex::Regex;
use serde_json::{json, Value};

/// A parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equal to
    Eq(String),
    /// Not equal to
    Ne(String),
    /// Lexicographically greater than
    Gt(String),
    /// Lexicographically greater than or equal to
    Gte(String),
    /// Lexicographically less than
    Lt(String),
    /// Lexicographically less than or equal to
    Lte(String),
    /// Member of the set
    In(Vec<String>),
    /// Not a member of the set
    Nin(Vec<String>),
    /// SQL LIKE pattern (`%` any run, `_` one character)
    Like(String),
    /// Negated SQL LIKE pattern
    NotLike(String),
    /// Regular expression match
    Match(String),
    /// All of the children hold
    And(Vec<Filter>),
    /// Any of the children holds
    Or(Vec<Filter>),
    /// The child does not hold
    Not(Box<Filter>),
}

impl Filter {
    /// Membership filter over a list of values
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(values.into_iter().map(Into::into).collect())
    }

    /// Nesting depth of the tree, leaves count as 1
    pub fn depth(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(Filter::depth).max().unwrap_or(0)
            }
            Self::Not(child) => 1 + child.depth(),
            _ => 1,
        }
    }

    /// Evaluate the filter against a dimension value.
    ///
    /// A missing value only satisfies negative leaves (`$ne`, `$nin`,
    /// `$nlike`) and negations. Patterns are compiled on every call, so
    /// use [`Filter::compile`] when evaluating many values.
    pub fn matches(&self, value: Option<&str>) -> bool {
        self.compile().matches(value)
    }

    /// Compile the LIKE and `$match` patterns of the tree once
    pub fn compile(&self) -> CompiledFilter<'_> {
        match self {
            Self::Like(p) => CompiledFilter::Pattern { regex: like_regex(p), negated: false },
            Self::NotLike(p) => CompiledFilter::Pattern { regex: like_regex(p), negated: true },
            Self::Match(p) => CompiledFilter::Pattern { regex: Regex::new(p).ok(), negated: false },
            Self::And(children) => CompiledFilter::And(children.iter().map(Filter::compile).collect()),
            Self::Or(children) => CompiledFilter::Or(children.iter().map(Filter::compile).collect()),
            Self::Not(child) => CompiledFilter::Not(Box::new(child.compile())),
            leaf => CompiledFilter::Compare(leaf),
        }
    }

    fn compare(&self, v: &str) -> bool {
        match self {
            Self::Eq(x) => v == x,
            Self::Ne(x) => v != x,
            Self::Gt(x) => v > x.as_str(),
            Self::Gte(x) => v >= x.as_str(),
            Self::Lt(x) => v < x.as_str(),
            Self::Lte(x) => v <= x.as_str(),
            Self::In(xs) => xs.iter().any(|x| x == v),
            Self::Nin(xs) => !xs.iter().any(|x| x == v),
            // compiled into CompiledFilter::Pattern or composite nodes
            _ => false,
        }
    }

    /// Render the JSON form of this filter
    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq(x) => json!({ "$eq": x }),
            Self::Ne(x) => json!({ "$ne": x }),
            Self::Gt(x) => json!({ "$gt": x }),
            Self::Gte(x) => json!({ "$gte": x }),
            Self::Lt(x) => json!({ "$lt": x }),
            Self::Lte(x) => json!({ "$lte": x }),
            Self::In(xs) => json!({ "$in": xs }),
            Self::Nin(xs) => json!({ "$nin": xs }),
            Self::Like(p) => json!({ "$like": p }),
            Self::NotLike(p) => json!({ "$nlike": p }),
            Self::Match(p) => json!({ "$match": p }),
            Self::And(cs) => json!({ "$and": cs.iter().map(Filter::to_json).collect::<Vec<_>>() }),
            Self::Or(cs) => json!({ "$or": cs.iter().map(Filter::to_json).collect::<Vec<_>>() }),
            Self::Not(c) => json!({ "$not": c.to_json() }),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A [`Filter`] with its patterns compiled, borrowed from the source tree
#[derive(Debug, Clone)]
pub enum CompiledFilter<'a> {
    /// Comparison or membership leaf
    Compare(&'a Filter),
    /// LIKE or regex leaf; `regex` is `None` when the pattern does not compile
    Pattern { regex: Option<Regex>, negated: bool },
    /// All of the children hold
    And(Vec<CompiledFilter<'a>>),
    /// Any of the children holds
    Or(Vec<CompiledFilter<'a>>),
    /// The child does not hold
    Not(Box<CompiledFilter<'a>>),
}

impl CompiledFilter<'_> {
    /// Evaluate against a dimension value, same semantics as [`Filter::matches`]
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.matches(value)),
            Self::Or(children) => children.iter().any(|c| c.matches(value)),
            Self::Not(child) => !child.matches(value),
            Self::Pattern { regex, negated } => {
                let hit = match (regex, value) {
                    (Some(re), Some(v)) => re.is_match(v),
                    _ => false,
                };
                hit != *negated
            }
            Self::Compare(leaf) => match value {
                Some(v) => leaf.compare(v),
                None => matches!(leaf, Filter::Ne(_) | Filter::Nin(_)),
            },
        }
    }
}

/// Translate a LIKE pattern into an anchored regex
pub(crate) fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}
