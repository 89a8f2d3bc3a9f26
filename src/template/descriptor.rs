//! Template descriptor types
//!
//! The descriptor is the artifact a synthesis run produces: the skeleton
//! shared by every sampled page and the fields whose values vary.

use crate::template::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a skeleton node's content is fixed across the sampled pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marking {
    Invariant,
    Variant,
}

/// A node of the template skeleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonNode {
    pub tag: String,
    /// Attribute values; `None` when the value differs between pages
    pub attributes: BTreeMap<String, Option<String>>,
    /// Own text when identical on every page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub marking: Marking,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SkeletonNode>,
}

impl SkeletonNode {
    /// Renders this node as a selector step: `tag#id.class1.class2`
    ///
    /// Only attribute values that are fixed across pages are used.
    pub fn selector_step(&self) -> String {
        selector_step(
            &self.tag,
            self.attributes.get("id").and_then(Option::as_deref),
            self.attributes.get("class").and_then(Option::as_deref),
        )
    }

    /// Counts this node and all of its descendants
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(SkeletonNode::size).sum::<usize>()
    }

    /// Returns true if this node and every descendant are invariant
    pub fn is_fully_invariant(&self) -> bool {
        self.marking == Marking::Invariant
            && self.children.iter().all(SkeletonNode::is_fully_invariant)
    }
}

/// Formats a selector step from a tag and optional id and class values
pub(crate) fn selector_step(tag: &str, id: Option<&str>, class: Option<&str>) -> String {
    let mut step = tag.to_string();
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        step.push('#');
        step.push_str(id);
    }
    for name in class.unwrap_or_default().split_whitespace() {
        step.push('.');
        step.push_str(name);
    }
    step
}

impl From<&Node> for SkeletonNode {
    /// Copies a document tree with every node invariant
    fn from(node: &Node) -> Self {
        Self {
            tag: node.tag.clone(),
            attributes: node
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), Some(value.clone())))
                .collect(),
            text: node.text.clone(),
            marking: Marking::Invariant,
            children: node.children.iter().map(SkeletonNode::from).collect(),
        }
    }
}

/// What part of the located node holds a field's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldTarget {
    /// The node's own text
    Text,
    /// The value of one attribute
    Attribute { name: String },
    /// A whole subtree present on some pages only; sampled as its text
    Subtree,
}

/// A position whose content varies between pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Selector steps from the root to the nearest invariant ancestor
    pub anchor: Vec<String>,
    /// Selector steps from the anchor down to the field's node
    pub path: Vec<String>,
    pub target: FieldTarget,
    /// Distinct observed values in first-seen order
    pub samples: Vec<String>,
}

impl Field {
    /// Joins anchor and path into a child-combinator selector
    pub fn selector(&self) -> String {
        self.anchor
            .iter()
            .chain(self.path.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// The result of a synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Number of documents the template was synthesized from
    pub document_count: usize,
    pub skeleton: SkeletonNode,
    pub fields: Vec<Field>,
    /// Fingerprint of the documents the template was synthesized from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input_hash: String,
}

impl TemplateDescriptor {
    /// Serializes the descriptor as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
