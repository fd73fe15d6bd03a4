use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::parse::parse_paths;
use crate::tree::{Tree, TreeBuilder};
use crate::types::{path_to_string, ParseError, Path};

/// A parsed fields expression, as used for partial responses.
///
/// Holds the original text, every path the expression selects, the minimal set of paths
/// once redundant ones are removed, and the filter tree built from that minimal set.
#[derive(Debug, Clone)]
pub struct FieldsExpression {
    text: String,
    all_paths: Vec<Path>,
    collapsed_paths: Vec<Path>,
    tree: Tree,
}

impl FromStr for FieldsExpression {
    type Err = ParseError;

    /// Parses an input string into a `FieldsExpression`.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use fieldmask::FieldsExpression;
    ///
    /// let expression = "items(id,title)".parse::<FieldsExpression>().unwrap();
    /// assert_eq!(expression.field_paths().len(), 2);
    /// ```
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl FieldsExpression {
    /// Parses a fields expression.
    ///
    /// ## Arguments
    ///
    /// * `text` - The expression, e.g. "etag,items(id,author/uri)"
    ///
    /// ## Returns
    ///
    /// Returns the parsed expression, or a `ParseError` if any part of `text` is malformed.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let all_paths = parse_paths(text)?;
        let collapsed_paths = collapse_paths(&all_paths);

        let mut builder = TreeBuilder::new();
        let root = builder.root();
        for path in &collapsed_paths {
            builder.branch(root, path.iter().cloned());
        }

        debug!(
            target: "fieldmask::expression",
            expression = text,
            paths = all_paths.len(),
            collapsed = collapsed_paths.len(),
            "parsed fields expression"
        );

        Ok(FieldsExpression {
            text: text.to_string(),
            all_paths,
            collapsed_paths,
            tree: builder.build(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Every path of the expression, before redundant paths are removed.
    pub fn all_paths(&self) -> &[Path] {
        &self.all_paths
    }

    /// The minimal list of paths selecting the same fields.
    pub fn field_paths(&self) -> &[Path] {
        &self.collapsed_paths
    }

    /// The tree to hand to the streaming filter.
    pub fn filter_tree(&self) -> &Tree {
        &self.tree
    }

    /// The minimal paths written back as an expression, e.g. "items,etag".
    pub fn collapsed_text(&self) -> String {
        self.collapsed_paths
            .iter()
            .map(|path| path_to_string(path))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Checks that every selected path exists in `schema`.
    ///
    /// All paths are checked, not only the collapsed ones: `a,a/doesNotExist` collapses
    /// to `a` but is still invalid.
    pub fn is_valid_against(&self, schema: &Tree) -> bool {
        self.all_paths
            .iter()
            .map(tree_from_path)
            .all(|tree| schema.contains(&tree))
    }

    /// True if some selected path and `tested` designate overlapping data, i.e. one of
    /// them contains the other.
    pub fn overlaps_with(&self, tested: &Tree) -> bool {
        self.collapsed_paths
            .iter()
            .map(tree_from_path)
            .any(|tree| tree.contains(tested) || tested.contains(&tree))
    }
}

impl fmt::Display for FieldsExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn tree_from_path(path: &Path) -> Tree {
    TreeBuilder::of_branch(path.iter().cloned()).build()
}

/// Drops every path that has a strictly shorter path as a literal prefix: selecting a
/// field already selects everything beneath it. Equal paths are both kept.
pub fn collapse_paths(paths: &[Path]) -> Vec<Path> {
    paths
        .iter()
        .filter(|path| {
            !paths
                .iter()
                .any(|other| other.len() < path.len() && path.starts_with(other))
        })
        .cloned()
        .collect()
}
