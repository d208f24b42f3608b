//! Semantic filter validation

use regex::Regex;

use crate::filter::ast::{like_regex, Filter};
use crate::filter::error::{FilterError, FilterResult};

/// Deepest nesting accepted for a filter tree
pub const MAX_FILTER_DEPTH: usize = 8;

/// Check a parsed filter for semantic errors.
///
/// Rejects empty `$in`/`$nin`/`$and`/`$or` operands, empty LIKE patterns,
/// regexes that fail to compile and trees deeper than [`MAX_FILTER_DEPTH`].
pub fn validate_filter(filter: &Filter) -> FilterResult<()> {
    let depth = filter.depth();
    if depth > MAX_FILTER_DEPTH {
        return Err(FilterError::Invalid(format!(
            "filter is nested {} levels deep, at most {} allowed",
            depth, MAX_FILTER_DEPTH
        )));
    }
    validate_node(filter)
}

fn validate_node(filter: &Filter) -> FilterResult<()> {
    match filter {
        Filter::In(values) if values.is_empty() => {
            Err(FilterError::Invalid("$in requires at least one value".to_string()))
        }
        Filter::Nin(values) if values.is_empty() => {
            Err(FilterError::Invalid("$nin requires at least one value".to_string()))
        }
        Filter::Like(p) | Filter::NotLike(p) => {
            if p.is_empty() {
                return Err(FilterError::Invalid("LIKE pattern cannot be empty".to_string()));
            }
            like_regex(p)
                .map(|_| ())
                .ok_or_else(|| FilterError::Invalid(format!("invalid LIKE pattern '{}'", p)))
        }
        Filter::Match(p) => Regex::new(p)
            .map(|_| ())
            .map_err(|e| FilterError::Invalid(format!("invalid $match regex '{}': {}", p, e))),
        Filter::And(children) | Filter::Or(children) => {
            if children.is_empty() {
                let op = if matches!(filter, Filter::And(_)) { "$and" } else { "$or" };
                return Err(FilterError::Invalid(format!(
                    "{} requires at least one filter",
                    op
                )));
            }
            children.iter().try_for_each(validate_node)
        }
        Filter::Not(child) => validate_node(child),
        _ => Ok(()),
    }
}
