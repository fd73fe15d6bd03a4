//! Yes/no questions about a parsed expression, asked with literal field paths.
//!
//! Both checkers can be re-rooted with `starting_from`, which is handy when the same
//! check is repeated for the "get" and the "list" variant of a resource
//! (`items/name` in a list is `name` in a get).

use crate::expression::FieldsExpression;
use crate::tree::TreeBuilder;
use crate::types::{FieldPathError, Segment};

/// Validates a literal, wildcard-free `/`-separated field path and splits it.
fn split_field_path(field_path: &str) -> Result<Vec<&str>, FieldPathError> {
    if field_path.trim().is_empty() {
        return Err(FieldPathError::Blank);
    }
    if field_path.contains('*') {
        return Err(FieldPathError::Wildcard(field_path.to_string()));
    }
    if field_path.starts_with('/') || field_path.ends_with('/') || field_path.contains("//") {
        return Err(FieldPathError::Separators(field_path.to_string()));
    }
    Ok(field_path.split('/').collect())
}

fn rooted<'p>(prefix: &'p [String], field_path: &'p str) -> Result<Vec<&'p str>, FieldPathError> {
    let relative = split_field_path(field_path)?;
    Ok(prefix.iter().map(String::as_str).chain(relative).collect())
}

/// Tells whether a field should be kept when filtering with an expression.
///
/// A retained field is not necessarily present in the response, it just is not filtered
/// out. A field is retained when it is selected, when one of its ancestors is selected,
/// or when one of its descendants is selected.
#[derive(Debug, Clone)]
pub struct RetainedFieldChecker<'e> {
    expression: &'e FieldsExpression,
    prefix: Vec<String>,
}

impl<'e> RetainedFieldChecker<'e> {
    pub fn new(expression: &'e FieldsExpression) -> Self {
        RetainedFieldChecker {
            expression,
            prefix: Vec::new(),
        }
    }

    /// ## Example
    ///
    /// ```rust
    /// use fieldmask::{FieldsExpression, RetainedFieldChecker};
    ///
    /// let expression = FieldsExpression::parse("foo/*/bar").unwrap();
    /// let checker = RetainedFieldChecker::new(&expression);
    /// assert!(checker.is_retained("foo/baz/bar").unwrap());
    /// assert!(!checker.is_retained("bar").unwrap());
    /// ```
    pub fn is_retained(&self, field_path: &str) -> Result<bool, FieldPathError> {
        let to_check = rooted(&self.prefix, field_path)?;
        Ok(self
            .expression
            .field_paths()
            .iter()
            .any(|path| shares_prefix(path, &to_check)))
    }

    /// A checker whose paths are relative to `new_root_path`.
    pub fn starting_from(&self, new_root_path: &str) -> Result<Self, FieldPathError> {
        let prefix = rooted(&self.prefix, new_root_path)?
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(RetainedFieldChecker {
            expression: self.expression,
            prefix,
        })
    }
}

/// Walks both paths together until one ends. A wildcard may stand for several levels,
/// so reaching one retains the field.
fn shares_prefix(expression_path: &[Segment], to_check: &[&str]) -> bool {
    for (segment, name) in expression_path.iter().zip(to_check) {
        match segment {
            Segment::Wildcard | Segment::CatchAll => return true,
            Segment::Name(expected) if expected != name => return false,
            Segment::Name(_) => {}
        }
    }
    true
}

/// Tells whether a field is requested by an expression, using tree overlap: unlike
/// [`RetainedFieldChecker`], a wildcard stands for exactly one level.
#[derive(Debug, Clone)]
pub struct RequestedFields<'e> {
    expression: &'e FieldsExpression,
    prefix: Vec<String>,
}

impl<'e> RequestedFields<'e> {
    pub fn new(expression: &'e FieldsExpression) -> Self {
        RequestedFields {
            expression,
            prefix: Vec::new(),
        }
    }

    pub fn is_requested(&self, field_path: &str) -> Result<bool, FieldPathError> {
        let to_check = rooted(&self.prefix, field_path)?;
        let tested = TreeBuilder::of_branch(
            to_check
                .into_iter()
                .map(|name| Segment::Name(name.to_string())),
        )
        .build();
        Ok(self.expression.overlaps_with(&tested))
    }

    pub fn starting_from(&self, new_root_path: &str) -> Result<Self, FieldPathError> {
        let prefix = rooted(&self.prefix, new_root_path)?
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(RequestedFields {
            expression: self.expression,
            prefix,
        })
    }
}
