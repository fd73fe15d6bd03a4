//! Compiles discovery-document schemas into trees listing every field of a resource.
//!
//! A [`SchemaRepository`] owns one schema graph and caches one compiled tree per schema
//! name. Trees are built lazily, so schemas may reference each other (or themselves)
//! in any order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::tree::{Arena, NodeId, Tree};
use crate::types::{SchemaError, Segment};

/// The parts of an API discovery document this crate reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RestDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub schemas: BTreeMap<String, JsonSchema>,
}

/// One schema definition, as found under `schemas` in a discovery document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<JsonSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
}

/// How a property contributes to the tree.
enum SchemaKind<'s> {
    Reference(&'s str),
    /// Arrays are transparent in the path language: items compile at the same level.
    Array(&'s JsonSchema),
    Object,
    Any,
    Primitive,
}

impl JsonSchema {
    fn kind(&self, property: &Segment) -> Result<SchemaKind<'_>, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidSchema {
            name: property.to_string(),
            reason: reason.to_string(),
        };
        match (self.reference.as_deref(), self.kind.as_deref()) {
            (Some(_), Some(_)) => Err(invalid("type must be absent for $ref")),
            (Some(target), None) => Ok(SchemaKind::Reference(target)),
            (None, Some("array")) => self
                .items
                .as_deref()
                .map(SchemaKind::Array)
                .ok_or_else(|| invalid("items must be present for array types")),
            (None, Some("object")) => Ok(SchemaKind::Object),
            (None, Some("any")) | (None, None) => Ok(SchemaKind::Any),
            (None, Some(_)) => Ok(SchemaKind::Primitive),
        }
    }
}

#[derive(Debug, Default)]
struct Compiled {
    arena: Arc<Arena>,
    roots: HashMap<String, NodeId>,
}

/// Compiled resource trees for one schema graph.
///
/// ## Example
///
/// ```rust
/// use fieldmask::{FieldsExpression, SchemaRepository};
///
/// let repository = SchemaRepository::from_discovery_json(r#"{
///     "schemas": {
///         "Node": {
///             "type": "object",
///             "properties": {
///                 "name": { "type": "string" },
///                 "child": { "$ref": "Node" }
///             }
///         }
///     }
/// }"#).unwrap();
///
/// let schema = repository.resource_tree("Node").unwrap();
/// let expression = FieldsExpression::parse("child/child/name").unwrap();
/// assert!(expression.is_valid_against(&schema));
/// ```
#[derive(Debug)]
pub struct SchemaRepository {
    schemas: BTreeMap<String, JsonSchema>,
    compiled: Mutex<Compiled>,
}

impl SchemaRepository {
    pub fn new(schemas: BTreeMap<String, JsonSchema>) -> Self {
        SchemaRepository {
            schemas,
            compiled: Mutex::new(Compiled::default()),
        }
    }

    pub fn from_description(description: RestDescription) -> Self {
        Self::new(description.schemas)
    }

    /// Reads the `schemas` of a discovery document.
    pub fn from_discovery_json(json: &str) -> Result<Self, SchemaError> {
        let description: RestDescription = serde_json::from_str(json)?;
        Ok(Self::from_description(description))
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// The tree of every field of the schema `name`, compiled on first use.
    ///
    /// Compilation holds the repository lock, so concurrent callers never see a
    /// partially built tree. A failed compilation leaves no trace in the cache.
    pub fn resource_tree(&self, name: &str) -> Result<Tree, SchemaError> {
        let mut compiled = self
            .compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(&root) = compiled.roots.get(name) {
            trace!(target: "fieldmask::schema", schema = name, "resource tree served from cache");
            return Ok(Tree::from_arena(Arc::clone(&compiled.arena), root));
        }

        let Compiled { arena, roots } = &mut *compiled;
        let checkpoint = Arc::make_mut(arena).len();
        let mut compiler = Compiler {
            schemas: &self.schemas,
            arena: Arc::make_mut(arena),
            roots,
            created: Vec::new(),
        };
        match compiler.root_node(name) {
            Ok(root) => {
                debug!(
                    target: "fieldmask::schema",
                    schema = name,
                    compiled = compiler.created.len(),
                    nodes = compiler.arena.len(),
                    "compiled resource tree"
                );
                Ok(Tree::from_arena(Arc::clone(arena), root))
            }
            Err(err) => {
                for created in &compiler.created {
                    compiler.roots.remove(created);
                }
                compiler.arena.truncate(checkpoint);
                Err(err)
            }
        }
    }

    /// Compiles every schema of the graph.
    pub fn load_all(&self) -> Result<Vec<(String, Tree)>, SchemaError> {
        self.schema_names()
            .map(|name| self.resource_tree(name).map(|tree| (name.to_string(), tree)))
            .collect()
    }
}

struct Compiler<'s> {
    schemas: &'s BTreeMap<String, JsonSchema>,
    arena: &'s mut Arena,
    roots: &'s mut HashMap<String, NodeId>,
    created: Vec<String>,
}

impl<'s> Compiler<'s> {
    fn root_node(&mut self, name: &str) -> Result<NodeId, SchemaError> {
        if let Some(&root) = self.roots.get(name) {
            return Ok(root);
        }
        let schemas = self.schemas;
        let schema = schemas
            .get(name)
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))?;

        let root = self.arena.add_root();
        // registered before recursing so that cycles resolve to this node
        self.roots.insert(name.to_string(), root);
        self.created.push(name.to_string());
        self.build_node(root, schema)?;
        Ok(root)
    }

    fn build_node(&mut self, node: NodeId, schema: &'s JsonSchema) -> Result<(), SchemaError> {
        if let Some(properties) = &schema.properties {
            for (name, property) in properties {
                self.build_child(node, Segment::Name(name.clone()), property)?;
            }
        }
        if let Some(additional) = &schema.additional_properties {
            self.build_child(node, Segment::Wildcard, additional)?;
        }
        Ok(())
    }

    fn build_child(
        &mut self,
        parent: NodeId,
        label: Segment,
        schema: &'s JsonSchema,
    ) -> Result<(), SchemaError> {
        let child = self.arena.child(parent, label.clone());
        match schema.kind(&label)? {
            SchemaKind::Reference(target) => {
                let target_root = self.root_node(target)?;
                self.arena.merge(child, target_root)?;
            }
            SchemaKind::Array(items) => self.build_child(parent, label, items)?,
            SchemaKind::Object => self.build_node(child, schema)?,
            SchemaKind::Any => {
                self.arena.set_catch_all(child);
            }
            SchemaKind::Primitive => {}
        }
        Ok(())
    }
}
