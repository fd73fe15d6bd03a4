//! Projects a stream of JSON events through a fields tree.
//!
//! The filter never buffers values. It only remembers, per open container, whether the
//! container's start token (and the field name leading to it) has been written yet:
//! containers are written the first time something inside them is kept.

use serde_json::Value;
use tracing::{debug, trace};

use crate::tree::{Node, NodeId, Tree};
use crate::types::FilterError;

/// One token of a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    Scalar(Value),
}

/// Receives JSON events, in document order.
pub trait JsonSink {
    fn write_event(&mut self, event: JsonEvent) -> Result<(), FilterError>;

    /// Called once after the last event.
    fn close(&mut self) -> Result<(), FilterError> {
        Ok(())
    }
}

impl<S: JsonSink + ?Sized> JsonSink for &mut S {
    fn write_event(&mut self, event: JsonEvent) -> Result<(), FilterError> {
        (**self).write_event(event)
    }

    fn close(&mut self) -> Result<(), FilterError> {
        (**self).close()
    }
}

/// Records every event it receives.
impl JsonSink for Vec<JsonEvent> {
    fn write_event(&mut self, event: JsonEvent) -> Result<(), FilterError> {
        self.push(event);
        Ok(())
    }
}

/// Produces JSON events.
pub trait JsonSource {
    fn emit_into<S: JsonSink + ?Sized>(self, sink: &mut S) -> Result<(), FilterError>;
}

impl JsonSource for Vec<JsonEvent> {
    fn emit_into<S: JsonSink + ?Sized>(self, sink: &mut S) -> Result<(), FilterError> {
        self.into_iter().try_for_each(|event| sink.write_event(event))
    }
}

pub(crate) fn unbalanced(message: &str) -> FilterError {
    FilterError::UnbalancedEvent(message.to_string())
}

/// What is kept below the current position.
#[derive(Debug, Clone, PartialEq)]
enum FilterContext {
    IncludeAll,
    Exact(NodeId),
    /// Several tree nodes matched the same field, e.g. `a` and `*`.
    Union(Vec<FilterContext>),
}

/// A leaf, a wildcard chain ending in a leaf, or a catch-all keeps everything below.
fn admits_all(node: Node<'_>) -> bool {
    node.is_transitive_leaf() || node.children().any(|child| child.is_catch_all())
}

impl FilterContext {
    fn of(node: Node<'_>) -> Self {
        if admits_all(node) {
            FilterContext::IncludeAll
        } else {
            FilterContext::Exact(node.id())
        }
    }

    fn combine(contexts: Vec<FilterContext>) -> Option<FilterContext> {
        let mut flat = Vec::with_capacity(contexts.len());
        for context in contexts {
            match context {
                FilterContext::IncludeAll => return Some(FilterContext::IncludeAll),
                FilterContext::Union(members) => flat.extend(members),
                exact => {
                    if !flat.contains(&exact) {
                        flat.push(exact);
                    }
                }
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(FilterContext::Union(flat)),
        }
    }

    /// The context for the value of field `name`, `None` if the field is dropped.
    fn include_field(&self, tree: &Tree, name: &str) -> Option<FilterContext> {
        match self {
            FilterContext::IncludeAll => Some(FilterContext::IncludeAll),
            FilterContext::Exact(id) => Self::combine(
                tree.node(*id)
                    .children()
                    .filter(|child| child.matches(name))
                    .map(FilterContext::of)
                    .collect(),
            ),
            FilterContext::Union(members) => Self::combine(
                members
                    .iter()
                    .filter_map(|member| member.include_field(tree, name))
                    .collect(),
            ),
        }
    }

    /// Scalars reached through a wildcard are kept even if the path goes on below it.
    fn include_scalar(&self, tree: &Tree) -> bool {
        match self {
            FilterContext::IncludeAll => true,
            FilterContext::Exact(id) => {
                let node = tree.node(*id);
                node.is_wildcard() || admits_all(node)
            }
            FilterContext::Union(members) => members.iter().any(|member| member.include_scalar(tree)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

impl Container {
    fn start(self) -> JsonEvent {
        match self {
            Container::Object => JsonEvent::StartObject,
            Container::Array => JsonEvent::StartArray,
        }
    }

    fn end(self) -> JsonEvent {
        match self {
            Container::Object => JsonEvent::EndObject,
            Container::Array => JsonEvent::EndArray,
        }
    }
}

#[derive(Debug)]
struct PendingField {
    name: String,
    context: Option<FilterContext>,
}

#[derive(Debug)]
struct Frame {
    kind: Container,
    /// `None` while inside a dropped subtree.
    context: Option<FilterContext>,
    /// The field this container is the value of.
    field: Option<String>,
    written: bool,
    pending: Option<PendingField>,
}

/// A [`JsonSink`] that forwards only the parts of a document selected by a tree.
///
/// ## Example
///
/// ```rust
/// use fieldmask::{FieldsExpression, FilteringSink, JsonEvent, JsonSink};
/// use serde_json::json;
///
/// let expression = FieldsExpression::parse("a").unwrap();
/// let mut filter = FilteringSink::new(Vec::new(), expression.filter_tree());
/// for event in [
///     JsonEvent::StartObject,
///     JsonEvent::FieldName("a".to_string()),
///     JsonEvent::Scalar(json!(1)),
///     JsonEvent::FieldName("b".to_string()),
///     JsonEvent::Scalar(json!(2)),
///     JsonEvent::EndObject,
/// ] {
///     filter.write_event(event).unwrap();
/// }
/// filter.close().unwrap();
///
/// assert_eq!(filter.match_count(), 1);
/// assert_eq!(filter.into_inner().len(), 4);
/// ```
#[derive(Debug)]
pub struct FilteringSink<'t, S> {
    inner: S,
    tree: &'t Tree,
    root_context: FilterContext,
    frames: Vec<Frame>,
    root_kind: Option<Container>,
    root_done: bool,
    matches: usize,
}

impl<'t, S: JsonSink> FilteringSink<'t, S> {
    pub fn new(inner: S, tree: &'t Tree) -> Self {
        FilteringSink {
            inner,
            tree,
            root_context: FilterContext::of(tree.root()),
            frames: Vec::new(),
            root_kind: None,
            root_done: false,
            matches: 0,
        }
    }

    /// Number of values kept so far. A container kept as a whole counts once.
    pub fn match_count(&self) -> usize {
        self.matches
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Writes every not yet written container start on the current branch.
    fn materialize(&mut self) -> Result<(), FilterError> {
        for frame in self.frames.iter_mut().filter(|frame| !frame.written) {
            if let Some(field) = &frame.field {
                self.inner.write_event(JsonEvent::FieldName(field.clone()))?;
            }
            self.inner.write_event(frame.kind.start())?;
            frame.written = true;
        }
        Ok(())
    }

    /// The context of the next value and the field name it belongs to.
    fn next_value(&mut self) -> Result<(Option<FilterContext>, Option<String>), FilterError> {
        match self.frames.last_mut() {
            None if self.root_done => Err(unbalanced("more than one root value")),
            None => Ok((Some(self.root_context.clone()), None)),
            Some(frame) if frame.kind == Container::Array => Ok((frame.context.clone(), None)),
            Some(frame) => {
                let pending = frame
                    .pending
                    .take()
                    .ok_or_else(|| unbalanced("object value without a field name"))?;
                Ok((pending.context, Some(pending.name)))
            }
        }
    }

    /// Whether the innermost open container is kept as a whole and was counted already.
    fn inside_kept_container(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.context == Some(FilterContext::IncludeAll))
    }

    fn write_scalar(&mut self, value: Value) -> Result<(), FilterError> {
        let at_root = self.frames.is_empty();
        let counted = self.inside_kept_container();
        let (context, field) = self.next_value()?;
        // a bare scalar document has no fields to select
        let keep = at_root || context.is_some_and(|context| context.include_scalar(self.tree));
        if at_root {
            self.root_done = true;
        }
        if !keep {
            return Ok(());
        }
        self.materialize()?;
        if let Some(field) = field {
            self.inner.write_event(JsonEvent::FieldName(field))?;
        }
        self.inner.write_event(JsonEvent::Scalar(value))?;
        if !counted {
            self.matches += 1;
        }
        Ok(())
    }

    fn start(&mut self, kind: Container) -> Result<(), FilterError> {
        let counted = self.inside_kept_container();
        let (context, field) = self.next_value()?;
        if self.frames.is_empty() {
            self.root_kind = Some(kind);
        }
        let include_all = context == Some(FilterContext::IncludeAll);
        self.frames.push(Frame {
            kind,
            context,
            field,
            written: false,
            pending: None,
        });
        if include_all {
            self.materialize()?;
            if !counted {
                self.matches += 1;
            }
        }
        Ok(())
    }

    fn end(&mut self, kind: Container) -> Result<(), FilterError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| unbalanced("container end without a start"))?;
        if frame.kind != kind {
            return Err(unbalanced("container end does not match its start"));
        }
        if frame.pending.is_some() {
            return Err(unbalanced("field name without a value"));
        }
        if frame.written {
            self.inner.write_event(kind.end())?;
        }
        if self.frames.is_empty() {
            self.root_done = true;
        }
        Ok(())
    }

    fn field_name(&mut self, name: String) -> Result<(), FilterError> {
        let tree = self.tree;
        let frame = match self.frames.last_mut() {
            Some(frame) if frame.kind == Container::Object && frame.pending.is_none() => frame,
            _ => return Err(unbalanced("field name outside of an object")),
        };
        let context = frame
            .context
            .as_ref()
            .and_then(|context| context.include_field(tree, &name));
        if !matches!(frame.context, None | Some(FilterContext::IncludeAll)) {
            trace!(target: "fieldmask::filter", field = %name, kept = context.is_some(), "field filtered");
        }
        frame.pending = Some(PendingField { name, context });
        Ok(())
    }
}

impl<S: JsonSink> JsonSink for FilteringSink<'_, S> {
    fn write_event(&mut self, event: JsonEvent) -> Result<(), FilterError> {
        match event {
            JsonEvent::StartObject => self.start(Container::Object),
            JsonEvent::StartArray => self.start(Container::Array),
            JsonEvent::EndObject => self.end(Container::Object),
            JsonEvent::EndArray => self.end(Container::Array),
            JsonEvent::FieldName(name) => self.field_name(name),
            JsonEvent::Scalar(value) => self.write_scalar(value),
        }
    }

    /// Emits an empty `{}` or `[]` if nothing at all was kept, then closes the inner sink.
    fn close(&mut self) -> Result<(), FilterError> {
        if !self.frames.is_empty() {
            return Err(unbalanced("stream ended inside a container"));
        }
        if self.matches == 0 {
            if let Some(kind) = self.root_kind {
                debug!(target: "fieldmask::filter", "no value matched, writing an empty document");
                self.inner.write_event(kind.start())?;
                self.inner.write_event(kind.end())?;
            }
        }
        self.inner.close()
    }
}

/// Copies every event of `source` through a [`FilteringSink`] into `sink`, closes it
/// and hands `sink` back.
pub fn copy_filtered<Src, S>(source: Src, sink: S, tree: &Tree) -> Result<S, FilterError>
where
    Src: JsonSource,
    S: JsonSink,
{
    let mut filter = FilteringSink::new(sink, tree);
    source.emit_into(&mut filter)?;
    filter.close()?;
    Ok(filter.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;
    use crate::types::Segment;
    use serde_json::json;

    fn name(s: &str) -> JsonEvent {
        JsonEvent::FieldName(s.to_string())
    }

    fn scalar(value: Value) -> JsonEvent {
        JsonEvent::Scalar(value)
    }

    fn run(events: Vec<JsonEvent>, tree: &Tree) -> Vec<JsonEvent> {
        copy_filtered(events, Vec::new(), tree).unwrap()
    }

    #[test]
    fn empty_tree_keeps_everything() {
        let tree = TreeBuilder::new().build();
        let events = vec![JsonEvent::StartObject, name("a"), scalar(json!(1)), JsonEvent::EndObject];
        assert_eq!(run(events.clone(), &tree), events);
    }

    #[test]
    fn dropped_containers_leave_no_shell() {
        let tree = TreeBuilder::of_branch(["b"]).build();
        let events = vec![
            JsonEvent::StartObject,
            name("a"),
            JsonEvent::StartObject,
            name("x"),
            scalar(json!(1)),
            JsonEvent::EndObject,
            name("b"),
            scalar(json!(2)),
            JsonEvent::EndObject,
        ];
        assert_eq!(
            run(events, &tree),
            vec![JsonEvent::StartObject, name("b"), scalar(json!(2)), JsonEvent::EndObject]
        );
    }

    #[test]
    fn no_match_writes_an_empty_array() {
        let tree = TreeBuilder::of_branch(["b"]).build();
        let events = vec![
            JsonEvent::StartArray,
            JsonEvent::StartObject,
            name("a"),
            scalar(json!("1")),
            JsonEvent::EndObject,
            JsonEvent::EndArray,
        ];
        assert_eq!(run(events, &tree), vec![JsonEvent::StartArray, JsonEvent::EndArray]);
    }

    #[test]
    fn empty_stream_writes_nothing() {
        let tree = TreeBuilder::of_branch(["b"]).build();
        assert!(run(Vec::new(), &tree).is_empty());
    }

    #[test]
    fn union_of_name_and_wildcard() {
        let mut builder = TreeBuilder::of_branch(["*", "x"]);
        let root = builder.root();
        builder.branch(root, ["a", "y"]);
        let tree = builder.build();
        let a = tree.root().child(&Segment::from("a")).unwrap();
        let star = tree.root().child(&Segment::Wildcard).unwrap();

        let context = FilterContext::of(tree.root());
        assert_eq!(
            context.include_field(&tree, "a"),
            Some(FilterContext::Union(vec![
                FilterContext::Exact(star.id()),
                FilterContext::Exact(a.id()),
            ]))
        );
        assert_eq!(context.include_field(&tree, "b"), Some(FilterContext::Exact(star.id())));
    }

    #[test]
    fn catch_all_admits_everything() {
        let mut builder = TreeBuilder::of_branch(["meta"]);
        let meta = builder.child(builder.root(), Segment::from("meta"));
        builder.set_catch_all(meta);
        let tree = builder.build();
        let context = FilterContext::of(tree.root());
        assert_eq!(context.include_field(&tree, "meta"), Some(FilterContext::IncludeAll));
    }

    #[test]
    fn kept_containers_count_once() {
        let document = json!({"a": {"b": [1, {"c": 2}]}, "d": 3, "e": {"a": 4}});

        let tree = TreeBuilder::new().build();
        let mut filter = FilteringSink::new(Vec::new(), &tree);
        (&document).emit_into(&mut filter).unwrap();
        assert_eq!(filter.match_count(), 1);

        let tree = TreeBuilder::of_branch(["a"]).build();
        let mut filter = FilteringSink::new(Vec::new(), &tree);
        (&document).emit_into(&mut filter).unwrap();
        assert_eq!(filter.match_count(), 1);

        let tree = TreeBuilder::with_children(["d", "e"]).build();
        let mut filter = FilteringSink::new(Vec::new(), &tree);
        (&document).emit_into(&mut filter).unwrap();
        assert_eq!(filter.match_count(), 2);
    }

    #[test]
    fn unbalanced_streams_are_rejected() {
        let tree = TreeBuilder::new().build();
        let mut filter = FilteringSink::new(Vec::new(), &tree);
        assert!(matches!(
            filter.write_event(JsonEvent::EndObject),
            Err(FilterError::UnbalancedEvent(_))
        ));

        let mut filter = FilteringSink::new(Vec::new(), &tree);
        filter.write_event(JsonEvent::StartObject).unwrap();
        assert!(matches!(
            filter.write_event(scalar(json!(1))),
            Err(FilterError::UnbalancedEvent(_))
        ));

        let mut filter = FilteringSink::new(Vec::new(), &tree);
        filter.write_event(JsonEvent::StartArray).unwrap();
        assert!(matches!(filter.close(), Err(FilterError::UnbalancedEvent(_))));
    }
}
