//! The Caliper metadata tree.
//!
//! Nodes arrive on `node` records and are stored in an arena keyed by
//! their numeric id, with the parent relation held as an id rather than
//! a pointer. The tree is append-only: nodes are created once and never
//! mutated, except to attach the memoized expansion of their ancestor
//! chain the first time it is needed.

use log::warn;
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::utils::error::ReaderError;

/// Flattened attribute mapping for one node and all its ancestors.
///
/// Values are kept as lists here; the stream reader scalarizes
/// single-element lists when it assembles the final record.
pub type Expansion = BTreeMap<String, Vec<String>>;

/// Synthetic key collecting the values of nested attributes along a
/// node's ancestor chain, oldest ancestor first.
pub const PATH_KEY: &str = "path";

/// One entry in the metadata tree.
#[derive(Debug)]
pub struct Node {
    id: u64,
    attribute_id: u64,
    data: String,
    parent: Option<u64>,
    expansion: OnceCell<Expansion>,
}

impl Node {
    fn new(id: u64, attribute_id: u64, data: String, parent: Option<u64>) -> Self {
        Self {
            id,
            attribute_id,
            data,
            parent,
            expansion: OnceCell::new(),
        }
    }

    /// This node's id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the node describing this node's attribute.
    pub fn attribute_id(&self) -> u64 {
        self.attribute_id
    }

    /// The node's scalar data value.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Id of the parent node, or None for roots.
    pub fn parent(&self) -> Option<u64> {
        self.parent
    }
}

/// The scope a thread-visibility attribute was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    Process,
    Thread,
    Task,
    Unknown,
}

impl fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeScope::Process => "process",
            AttributeScope::Thread => "thread",
            AttributeScope::Task => "task",
            AttributeScope::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A Caliper attribute key.
///
/// A typed view over the tree node that defines an attribute name.
/// Properties and type are resolved from the node's ancestor chain once,
/// when the attribute is registered.
#[derive(Debug, Clone)]
pub struct Attribute {
    node_id: u64,
    name: String,
    properties: u64,
    attr_type: String,
}

impl Attribute {
    /// Node id of the bootstrap "cali.attribute.name" attribute.
    pub const NAME_ATTR_ID: u64 = 8;
    /// Node id of the bootstrap "cali.attribute.type" attribute.
    pub const TYPE_ATTR_ID: u64 = 9;
    /// Node id of the bootstrap "cali.attribute.prop" attribute.
    pub const PROP_ATTR_ID: u64 = 10;

    // Property flags, as defined in Caliper's cali_types.h.
    pub const ASVALUE: u64 = 1;
    pub const HIDDEN: u64 = 128;
    pub const NESTED: u64 = 256;
    pub const GLOBAL: u64 = 512;
    pub const AGGREGATABLE: u64 = 2048;

    // Scope is encoded in the low bits; the values are mutually exclusive.
    const SCOPE_MASK: u64 = 60;
    const SCOPE_PROCESS: u64 = 12;
    const SCOPE_THREAD: u64 = 20;
    const SCOPE_TASK: u64 = 24;

    /// The attribute's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node id of the attribute definition.
    pub fn id(&self) -> u64 {
        self.node_id
    }

    /// The raw property bit flags.
    pub fn properties(&self) -> u64 {
        self.properties
    }

    /// The name of the attribute's Caliper data type.
    pub fn attribute_type(&self) -> &str {
        &self.attr_type
    }

    /// Attributes with the "nested" property define the hierarchy of
    /// begin/end annotations and contribute to the synthetic "path" key.
    pub fn is_nested(&self) -> bool {
        self.properties & Self::NESTED != 0
    }

    /// Attributes with the "as_value" property are stored inline in
    /// snapshot records rather than in the metadata tree.
    pub fn is_value(&self) -> bool {
        self.properties & Self::ASVALUE != 0
    }

    /// Hidden attributes are excluded from flattened records.
    pub fn is_hidden(&self) -> bool {
        self.properties & Self::HIDDEN != 0
    }

    /// Global attributes carry run-level metadata.
    pub fn is_global(&self) -> bool {
        self.properties & Self::GLOBAL != 0
    }

    pub fn is_aggregatable(&self) -> bool {
        self.properties & Self::AGGREGATABLE != 0
    }

    /// The declared visibility scope of this attribute.
    pub fn scope(&self) -> AttributeScope {
        match self.properties & Self::SCOPE_MASK {
            Self::SCOPE_PROCESS => AttributeScope::Process,
            Self::SCOPE_THREAD => AttributeScope::Thread,
            Self::SCOPE_TASK => AttributeScope::Task,
            _ => AttributeScope::Unknown,
        }
    }

    /// Look up a metadata value for this attribute, e.g. "attribute.unit".
    ///
    /// Walks the attribute node's parent chain for the first node carrying
    /// the given metadata attribute.
    pub fn get<'db>(&self, db: &'db MetadataDb, key: &str) -> Option<&'db str> {
        let target = db.attribute(key)?.id();
        db.chain_data(self.node_id, target)
    }
}

/// The Caliper metadata tree.
///
/// **Public** - owned by one stream reader for the lifetime of a single
/// decoding session. Not meant to be shared across concurrently decoded
/// sources; give each source its own instance.
#[derive(Debug)]
pub struct MetadataDb {
    nodes: HashMap<u64, Node>,
    attributes: HashMap<String, Attribute>,
    attribute_names: HashMap<u64, String>,
}

/// The Caliper primitive type names, in type-id order.
const TYPES: [&str; 10] = [
    "inv", "usr", "int", "uint", "string", "addr", "double", "bool", "type", "ptr",
];

impl MetadataDb {
    /// Create a tree pre-populated with the bootstrap schema.
    ///
    /// The wire format references these node ids implicitly in attribute
    /// definitions, so the ids must match the writer exactly: nodes 0-7
    /// and 11 describe the primitive types, nodes 8-10 are the three
    /// self-describing bootstrap attributes.
    pub fn new() -> Self {
        let mut db = Self {
            nodes: HashMap::new(),
            attributes: HashMap::new(),
            attribute_names: HashMap::new(),
        };

        for (id, type_name) in TYPES[1..9].iter().enumerate() {
            db.insert_node(id as u64, Attribute::TYPE_ATTR_ID, type_name, None);
        }
        db.insert_node(11, Attribute::TYPE_ATTR_ID, TYPES[9], None);

        db.insert_node(8, Attribute::NAME_ATTR_ID, "cali.attribute.name", Some(3));
        db.insert_node(9, Attribute::NAME_ATTR_ID, "cali.attribute.type", Some(7));
        db.insert_node(10, Attribute::NAME_ATTR_ID, "cali.attribute.prop", Some(1));

        for id in [8, 9, 10] {
            db.register_attribute(id);
        }

        db
    }

    fn insert_node(&mut self, id: u64, attribute_id: u64, data: &str, parent: Option<u64>) {
        self.nodes
            .insert(id, Node::new(id, attribute_id, data.to_string(), parent));
    }

    /// Import one node from a `node` record.
    ///
    /// The node is linked to its parent if that parent is already known;
    /// an unknown parent leaves it a root. If the node defines an
    /// attribute name, the attribute is registered under both its name
    /// and its node id. Duplicate ids are skipped.
    pub fn import_node(&mut self, id: u64, attribute_id: u64, data: String, parent: Option<u64>) {
        if self.nodes.contains_key(&id) {
            warn!("duplicate node id {} ignored", id);
            return;
        }

        let parent = parent.filter(|p| self.nodes.contains_key(p));
        self.nodes
            .insert(id, Node::new(id, attribute_id, data, parent));

        if attribute_id == Attribute::NAME_ATTR_ID {
            self.register_attribute(id);
        }
    }

    fn register_attribute(&mut self, node_id: u64) {
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };
        let name = node.data.clone();

        // The definition's ancestor chain is complete at this point
        // (the format is forward-reference free), so properties and
        // type can be resolved once and cached.
        let properties = self
            .chain_data(node_id, Attribute::PROP_ATTR_ID)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let attr_type = self
            .chain_data(node_id, Attribute::TYPE_ATTR_ID)
            .unwrap_or(TYPES[0])
            .to_string();

        self.attribute_names.insert(node_id, name.clone());
        self.attributes.insert(
            name.clone(),
            Attribute {
                node_id,
                name,
                properties,
                attr_type,
            },
        );
    }

    /// Walk a node's parent chain for the first node with the given
    /// attribute id and return its data.
    fn chain_data(&self, node_id: u64, attribute_id: u64) -> Option<&str> {
        let mut cursor = self.nodes.get(&node_id);
        while let Some(node) = cursor {
            if node.attribute_id == attribute_id {
                return Some(&node.data);
            }
            cursor = node.parent.and_then(|p| self.nodes.get(&p));
        }
        None
    }

    /// Name and property flags for an arbitrary attribute node id.
    ///
    /// Falls back to an on-the-fly chain walk for attribute ids that were
    /// never registered as named attributes (the bootstrap type nodes).
    pub(crate) fn attribute_info(&self, attribute_id: u64) -> Result<(&str, u64), ReaderError> {
        if let Some(name) = self.attribute_names.get(&attribute_id) {
            if let Some(attr) = self.attributes.get(name) {
                return Ok((&attr.name, attr.properties));
            }
        }

        let node = self.nodes.get(&attribute_id).ok_or(ReaderError::UnknownNode {
            id: attribute_id,
            line: 0,
        })?;
        let properties = self
            .chain_data(attribute_id, Attribute::PROP_ATTR_ID)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        Ok((&node.data, properties))
    }

    /// Look up a node by id.
    pub fn node(&self, id: u64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Look up an attribute by the node id of its definition.
    pub fn attribute_by_id(&self, node_id: u64) -> Option<&Attribute> {
        self.attribute_names
            .get(&node_id)
            .and_then(|name| self.attributes.get(name))
    }

    /// Iterate over all registered attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Memoized flattening of a node's full ancestor chain.
    ///
    /// Each node contributes its attribute's name -> data, extending the
    /// value list when the same name repeats along the chain (oldest
    /// ancestor first); nested attributes additionally extend the
    /// synthetic "path" list. Hidden attributes are skipped.
    ///
    /// The expansion is computed once per node and reused by every later
    /// call for the node or its descendants, so snapshot streams that
    /// reference the same ancestor chains thousands of times pay the
    /// walk only once.
    ///
    /// # Errors
    /// * `ReaderError::UnknownNode` - the id or one of the referenced
    ///   attribute ids is not in the tree
    pub fn expand(&self, node_id: u64) -> Result<&Expansion, ReaderError> {
        let node = self.nodes.get(&node_id).ok_or(ReaderError::UnknownNode {
            id: node_id,
            line: 0,
        })?;

        if let Some(expansion) = node.expansion.get() {
            return Ok(expansion);
        }

        let mut expansion = match node.parent {
            Some(parent) => self.expand(parent)?.clone(),
            None => Expansion::new(),
        };

        let (name, properties) = self.attribute_info(node.attribute_id)?;
        if properties & Attribute::HIDDEN == 0 {
            expansion
                .entry(name.to_string())
                .or_default()
                .push(node.data.clone());
            if properties & Attribute::NESTED != 0 {
                expansion
                    .entry(PATH_KEY.to_string())
                    .or_default()
                    .push(node.data.clone());
            }
        }

        Ok(node.expansion.get_or_init(|| expansion))
    }
}

impl Default for MetadataDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_schema() {
        let db = MetadataDb::new();

        assert_eq!(db.node(8).unwrap().data(), "cali.attribute.name");
        assert_eq!(db.node(8).unwrap().parent(), Some(3));
        assert_eq!(db.node(11).unwrap().data(), "ptr");

        let name_attr = db.attribute("cali.attribute.name").unwrap();
        assert_eq!(name_attr.id(), 8);
        assert_eq!(name_attr.attribute_type(), "string");

        let prop_attr = db.attribute("cali.attribute.prop").unwrap();
        assert_eq!(prop_attr.attribute_type(), "int");
    }

    #[test]
    fn test_register_attribute_with_properties() {
        let mut db = MetadataDb::new();

        // string-typed attribute "region" with the nested property
        db.import_node(20, 10, "276".to_string(), Some(3));
        db.import_node(21, Attribute::NAME_ATTR_ID, "region".to_string(), Some(20));

        let attr = db.attribute("region").unwrap();
        assert_eq!(attr.id(), 21);
        assert_eq!(attr.attribute_type(), "string");
        assert!(attr.is_nested());
        assert!(!attr.is_value());
        assert!(!attr.is_hidden());
        assert_eq!(attr.scope(), AttributeScope::Thread);
    }

    #[test]
    fn test_scope_decoding() {
        let mut db = MetadataDb::new();

        db.import_node(20, 10, format!("{}", 12), Some(3));
        db.import_node(21, Attribute::NAME_ATTR_ID, "proc.attr".to_string(), Some(20));
        db.import_node(22, 10, format!("{}", 20 | 1), Some(3));
        db.import_node(23, Attribute::NAME_ATTR_ID, "thrd.attr".to_string(), Some(22));

        assert_eq!(db.attribute("proc.attr").unwrap().scope(), AttributeScope::Process);
        let thrd = db.attribute("thrd.attr").unwrap();
        assert_eq!(thrd.scope(), AttributeScope::Thread);
        assert!(thrd.is_value());
    }

    #[test]
    fn test_expand_is_idempotent() {
        let mut db = MetadataDb::new();

        db.import_node(20, Attribute::NAME_ATTR_ID, "region".to_string(), Some(3));
        db.import_node(21, 20, "main".to_string(), None);
        db.import_node(22, 20, "loop".to_string(), Some(21));

        let first = db.expand(22).unwrap().clone();
        let second = db.expand(22).unwrap().clone();
        assert_eq!(first, second);

        // repeated attribute along the chain collects into a list,
        // oldest ancestor first
        assert_eq!(first["region"], vec!["main", "loop"]);
    }

    #[test]
    fn test_expand_descendant_extends_ancestor() {
        let mut db = MetadataDb::new();

        db.import_node(20, Attribute::NAME_ATTR_ID, "region".to_string(), Some(3));
        db.import_node(21, 20, "main".to_string(), None);
        db.import_node(22, 20, "loop".to_string(), Some(21));

        let ancestor = db.expand(21).unwrap().clone();
        let descendant = db.expand(22).unwrap();

        assert_eq!(ancestor["region"], vec!["main"]);
        assert_eq!(descendant["region"], vec!["main", "loop"]);
    }

    #[test]
    fn test_expand_unknown_node() {
        let db = MetadataDb::new();
        assert!(db.expand(999).is_err());
    }

    #[test]
    fn test_duplicate_node_id_keeps_first() {
        let mut db = MetadataDb::new();

        db.import_node(20, Attribute::NAME_ATTR_ID, "first".to_string(), Some(3));
        db.import_node(20, Attribute::NAME_ATTR_ID, "second".to_string(), Some(3));

        assert_eq!(db.node(20).unwrap().data(), "first");
    }
}
