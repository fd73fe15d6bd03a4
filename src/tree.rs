//! Labeled trees shared by parsed fields expressions and compiled resource schemas.
//!
//! Nodes live in an [`Arena`] and refer to each other by [`NodeId`]. A node's children
//! are either owned by it or spliced in from another root (schema `$ref` resolution),
//! in which case they are resolved every time they are read. This lets a node be its
//! own descendant without any eager copying. Every traversal in this module guards
//! against revisiting a node (or node pair), so cyclic trees always terminate.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::types::{Segment, TreeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Owned(NodeId),
    /// All children of the referenced node, looked up at traversal time.
    Spliced(NodeId),
}

#[derive(Debug, Clone)]
struct NodeData {
    label: Option<Segment>,
    children: Vec<Child>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Drops every node created after `len` nodes existed.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    fn push(&mut self, label: Option<Segment>) -> NodeId {
        self.nodes.push(NodeData {
            label,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a new, unattached root node.
    pub(crate) fn add_root(&mut self) -> NodeId {
        self.push(None)
    }

    fn label(&self, id: NodeId) -> Option<&Segment> {
        self.nodes[id.0].label.as_ref()
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut resolved = Vec::new();
        let mut expanded = vec![id];
        self.collect_children(id, &mut resolved, &mut expanded);
        resolved
    }

    fn collect_children(&self, id: NodeId, resolved: &mut Vec<NodeId>, expanded: &mut Vec<NodeId>) {
        for child in &self.nodes[id.0].children {
            match *child {
                Child::Owned(owned) => resolved.push(owned),
                Child::Spliced(source) => {
                    if !expanded.contains(&source) {
                        expanded.push(source);
                        self.collect_children(source, resolved, expanded);
                    }
                }
            }
        }
    }

    fn find_child(&self, parent: NodeId, label: &Segment) -> Option<NodeId> {
        self.children(parent)
            .into_iter()
            .find(|&child| self.label(child) == Some(label))
    }

    /// Returns the child of `parent` labeled `label`, creating it if needed.
    pub(crate) fn child(&mut self, parent: NodeId, label: Segment) -> NodeId {
        if let Some(existing) = self.find_child(parent, &label) {
            return existing;
        }
        let child = self.push(Some(label));
        self.nodes[parent.0].children.push(Child::Owned(child));
        child
    }

    pub(crate) fn branch<I, S>(&mut self, parent: NodeId, segments: I) -> NodeId
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        segments
            .into_iter()
            .fold(parent, |current, segment| self.child(current, segment.into()))
    }

    /// Discards the children of `node` and gives it a single catch-all child.
    pub(crate) fn set_catch_all(&mut self, node: NodeId) -> NodeId {
        let catch_all = self.push(Some(Segment::CatchAll));
        self.nodes[node.0].children = vec![Child::Owned(catch_all)];
        catch_all
    }

    /// Splices the children of `other_root` into `node` without copying them.
    pub(crate) fn merge(&mut self, node: NodeId, other_root: NodeId) -> Result<(), TreeError> {
        if self.label(other_root).is_some() {
            return Err(TreeError::NotARoot);
        }
        let existing: HashSet<&Segment> = self
            .children(node)
            .into_iter()
            .filter_map(|child| self.label(child))
            .collect();
        let duplicates: Vec<Segment> = self
            .children(other_root)
            .into_iter()
            .filter_map(|child| self.label(child))
            .filter(|label| existing.contains(label))
            .cloned()
            .collect();
        if !duplicates.is_empty() {
            return Err(TreeError::DuplicateChildren(duplicates));
        }
        trace!(target: "fieldmask::tree", node = node.0, root = other_root.0, "splicing root children");
        self.nodes[node.0].children.push(Child::Spliced(other_root));
        Ok(())
    }
}

/// A read-only view of one node of a tree.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    arena: &'a Arena,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> Option<&'a Segment> {
        self.arena.label(self.id)
    }

    pub fn is_root(&self) -> bool {
        self.label().is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.arena.children(self.id).is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.label(), Some(Segment::Wildcard))
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self.label(), Some(Segment::CatchAll))
    }

    /// True if this node selects a field called `name`.
    pub fn matches(&self, name: &str) -> bool {
        match self.label() {
            Some(Segment::Wildcard) => true,
            Some(Segment::Name(label)) => label == name,
            _ => false,
        }
    }

    /// True for a leaf, or for a node with a wildcard child that is itself a transitive
    /// leaf: `a` and `a/*` both leave everything below `a` open.
    pub fn is_transitive_leaf(&self) -> bool {
        self.transitive_leaf(&mut HashSet::new())
    }

    fn transitive_leaf(&self, visited: &mut HashSet<NodeId>) -> bool {
        let children = self.arena.children(self.id);
        if children.is_empty() {
            return true;
        }
        // a wildcard cycle never reaches a leaf
        if !visited.insert(self.id) {
            return false;
        }
        children
            .into_iter()
            .map(|child| self.at(child))
            .any(|child| child.is_wildcard() && child.transitive_leaf(visited))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let arena = self.arena;
        arena
            .children(self.id)
            .into_iter()
            .map(move |id| Node { arena, id })
    }

    pub fn child(&self, label: &Segment) -> Option<Node<'a>> {
        self.arena
            .find_child(self.id, label)
            .map(|id| self.at(id))
    }

    fn at(&self, id: NodeId) -> Node<'a> {
        Node {
            arena: self.arena,
            id,
        }
    }

    fn contains(&self, other: Node<'_>, in_progress: &mut Vec<(NodeId, NodeId)>) -> bool {
        if self.is_catch_all() {
            return true;
        }
        if self.label() != other.label() && !self.is_wildcard() && !other.is_wildcard() {
            return false;
        }
        let pair = (self.id, other.id);
        if in_progress.contains(&pair) {
            return true;
        }
        in_progress.push(pair);
        let own: Vec<Node<'a>> = self.children().collect();
        let contained = other
            .children()
            .all(|theirs| own.iter().any(|mine| mine.contains(theirs, in_progress)));
        in_progress.pop();
        contained
    }

    fn same_structure(&self, other: Node<'_>, assumed: &mut HashSet<(NodeId, NodeId)>) -> bool {
        if self.label() != other.label() {
            return false;
        }
        if !assumed.insert((self.id, other.id)) {
            return true;
        }
        let mine: Vec<Node<'a>> = self.children().collect();
        let theirs: Vec<Node<'_>> = other.children().collect();
        mine.len() == theirs.len()
            && mine.iter().all(|child| {
                theirs
                    .iter()
                    .find(|candidate| candidate.label() == child.label())
                    .is_some_and(|candidate| child.same_structure(*candidate, assumed))
            })
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id.0)
            .field("label", &self.label())
            .finish()
    }
}

/// An immutable tree: a shared arena snapshot plus the id of its root.
#[derive(Clone)]
pub struct Tree {
    arena: Arc<Arena>,
    root: NodeId,
}

impl Tree {
    pub(crate) fn from_arena(arena: Arc<Arena>, root: NodeId) -> Self {
        Tree { arena, root }
    }

    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    /// Looks up a node of this tree by id.
    ///
    /// ## Panics
    ///
    /// Panics if `id` was not produced by this tree.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        assert!(id.0 < self.arena.len(), "node {} is not part of this tree", id.0);
        Node {
            arena: &self.arena,
            id,
        }
    }

    /// True if this tree accepts every path `other` accepts.
    pub fn contains(&self, other: &Tree) -> bool {
        self.root().contains(other.root(), &mut Vec::new())
    }

    /// One line per node, indented with `-` by depth. Nodes already printed on the
    /// current branch are marked and not descended into again.
    pub fn pretty_print(&self) -> String {
        let mut output = String::from("Tree{\n");
        let mut branch = vec![self.root];
        for child in self.root().children() {
            print_node(child, 0, &mut branch, &mut output);
        }
        output.push('}');
        output
    }
}

fn print_node(node: Node<'_>, depth: usize, branch: &mut Vec<NodeId>, output: &mut String) {
    output.push_str(&"-".repeat(depth));
    output.push_str(node.label().map(Segment::as_str).unwrap_or_default());
    if branch.contains(&node.id) {
        output.push_str(" (cycle)\n");
        return;
    }
    output.push('\n');
    branch.push(node.id);
    for child in node.children() {
        print_node(child, depth + 1, branch, output);
    }
    branch.pop();
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.root().same_structure(other.root(), &mut HashSet::new())
    }
}

impl Eq for Tree {}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_print())
    }
}

/// Mutable construction of a [`Tree`].
///
/// ## Example
///
/// ```rust
/// use fieldmask::{Segment, TreeBuilder};
///
/// let mut builder = TreeBuilder::of_branch(["items", "author", "uri"]);
/// let root = builder.root();
/// builder.branch(root, ["items", "title"]);
///
/// let tree = builder.build();
/// let items = tree.root().child(&Segment::from("items")).unwrap();
/// assert_eq!(items.children().count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    arena: Arena,
    root: NodeId,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// An empty root.
    pub fn new() -> Self {
        let mut arena = Arena::default();
        let root = arena.add_root();
        TreeBuilder { arena, root }
    }

    /// `with_children(["a", "b"])` builds root → a, b.
    pub fn with_children<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        let mut builder = Self::new();
        for label in labels {
            builder.child(builder.root, label.into());
        }
        builder
    }

    /// `of_branch(["a", "b"])` builds root → a → b.
    pub fn of_branch<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        let mut builder = Self::new();
        builder.branch(builder.root, segments);
        builder
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Another root in the same arena, usable as a [`merge`](Self::merge) source.
    pub fn detached_root(&mut self) -> NodeId {
        self.arena.add_root()
    }

    pub fn child(&mut self, parent: NodeId, label: Segment) -> NodeId {
        self.arena.child(parent, label)
    }

    pub fn branch<I, S>(&mut self, parent: NodeId, segments: I) -> NodeId
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        self.arena.branch(parent, segments)
    }

    pub fn set_catch_all(&mut self, node: NodeId) -> NodeId {
        self.arena.set_catch_all(node)
    }

    pub fn merge(&mut self, node: NodeId, other_root: NodeId) -> Result<(), TreeError> {
        self.arena.merge(node, other_root)
    }

    pub fn build(self) -> Tree {
        Tree::from_arena(Arc::new(self.arena), self.root)
    }
}
