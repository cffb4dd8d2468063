//! Caller query shape used to walk encrypted response trees.
//!
//! Only the shape matters here: field names, aliases and nested selections.
//! Nodes are never rewritten for transmission.

/// Child selections whose values carry encrypted items and are walked by
/// the projector.
pub const DECRYPTABLE_FIELDS: [&str; 2] = ["items", "files"];

/// One field selection with its nested sub-selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryNode {
    pub name: String,
    pub alias: Option<String>,
    pub children: Vec<QueryNode>,
}

impl QueryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            children: Vec::new(),
        }
    }

    /// Shorthand for a selection with children, e.g.
    /// `QueryNode::field("item", [QueryNode::new("text")])`.
    pub fn field(name: impl Into<String>, children: impl IntoIterator<Item = QueryNode>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            children: children.into_iter().collect(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_child(mut self, child: QueryNode) -> Self {
        self.children.push(child);
        self
    }

    /// Key under which this selection appears in a response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// First child selecting the field `name`, ignoring aliases.
    pub fn child(&self, name: &str) -> Option<&QueryNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Child selections of `items` / `files`, in declaration order. Aliased
    /// selections of the same field each appear once.
    pub fn decryptable_children(&self) -> impl Iterator<Item = &QueryNode> {
        self.children
            .iter()
            .filter(|c| DECRYPTABLE_FIELDS.contains(&c.name.as_str()))
    }
}
