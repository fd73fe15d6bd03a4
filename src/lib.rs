//! # fieldmask
//!
//! A Rust library for partial responses: parse a `fields` expression such as
//! `etag,items(id,author/*)`, check it against the schema of a resource, and filter JSON
//! responses down to the selected fields while streaming.
//!
//! ## Features
//!
//! - **Fields expressions:** Paths separated by `/`, selections separated by `,`, and
//!   parenthesised groups that distribute over their prefix (`a(b,c)` is `a/b,a/c`).
//! - **Wildcards:** `*` matches any single field name; trailing wildcards are redundant
//!   (`a/*` is `a`).
//! - **Schema validation:** Discovery-document schemas compile into trees, including
//!   recursive schemas, maps (`additionalProperties`) and free-form `any` values.
//! - **Streaming filter:** JSON events are filtered one at a time; containers with
//!   nothing selected inside are left out instead of being written empty.
//!
//! ## Examples
//!
//! ### Filtering a response:
//!
//! ```rust
//! use fieldmask::{filter_str, FieldsExpression};
//!
//! let expression = "items(id,author/name)".parse::<FieldsExpression>().unwrap();
//! let response = r#"{"kind":"list","items":[{"id":1,"title":"x","author":{"name":"n","uri":"u"}}]}"#;
//!
//! let filtered = filter_str(response, expression.filter_tree()).unwrap();
//! assert_eq!(filtered, r#"{"items":[{"id":1,"author":{"name":"n"}}]}"#);
//! ```
//!
//! ### Validating against a schema
//!
//! ```rust
//! use fieldmask::{FieldsExpression, SchemaRepository};
//!
//! let repository = SchemaRepository::from_discovery_json(r#"{
//!     "schemas": {
//!         "File": {
//!             "id": "File",
//!             "type": "object",
//!             "properties": {
//!                 "title": { "type": "string" },
//!                 "labels": {
//!                     "type": "object",
//!                     "properties": { "starred": { "type": "boolean" } }
//!                 }
//!             }
//!         }
//!     }
//! }"#).unwrap();
//! let schema = repository.resource_tree("File").unwrap();
//!
//! assert!(FieldsExpression::parse("title,labels/*").unwrap().is_valid_against(&schema));
//! assert!(!FieldsExpression::parse("labels/hidden").unwrap().is_valid_against(&schema));
//! ```
//!
//! ### Checking single fields
//!
//! ```rust
//! use fieldmask::{FieldsExpression, RequestedFields, RetainedFieldChecker};
//!
//! let expression = FieldsExpression::parse("items(id,owner/*)").unwrap();
//!
//! let retained = RetainedFieldChecker::new(&expression);
//! assert!(retained.is_retained("items").unwrap());
//! assert!(!retained.is_retained("kind").unwrap());
//!
//! let item = RequestedFields::new(&expression).starting_from("items").unwrap();
//! assert!(item.is_requested("owner/email").unwrap());
//! ```

mod checker;
mod expression;
mod filter;
mod json;
mod parse;
mod schema;
mod tree;
mod types;

pub use checker::{RequestedFields, RetainedFieldChecker};
pub use expression::{collapse_paths, FieldsExpression};
pub use filter::{copy_filtered, FilteringSink, JsonEvent, JsonSink, JsonSource};
pub use json::{filter_reader, filter_str, filter_value, JsonText, JsonWriter, ValueBuilder};
pub use parse::{parse_paths, strip_trailing_wildcards};
pub use schema::{JsonSchema, RestDescription, SchemaRepository};
pub use tree::{Node, NodeId, Tree, TreeBuilder};
pub use types::{
    path_to_string, FieldPathError, FilterError, ParseError, Path, SchemaError, Segment,
    TreeError, CATCH_ALL, WILDCARD,
};
