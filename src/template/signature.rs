//! Alignment signatures
//!
//! Two nodes are structurally equivalent when their signatures are equal:
//! same tag, same set of attribute names, same sibling position class.

use crate::template::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Where a node sits among its same-tag siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionClass {
    /// The first sibling with this tag
    First,
    /// Any later sibling with this tag
    Subsequent,
}

/// Per-node fingerprint used as the comparison key for alignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlignmentSignature {
    pub tag: String,
    /// Attribute names, sorted
    pub attr_names: Vec<String>,
    pub position: PositionClass,
}

impl AlignmentSignature {
    pub fn of(node: &Node, position: PositionClass) -> Self {
        Self {
            tag: node.tag.clone(),
            // BTreeMap keys are already sorted
            attr_names: node.attributes.keys().cloned().collect(),
            position,
        }
    }
}

impl fmt::Display for AlignmentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if !self.attr_names.is_empty() {
            write!(f, "[{}]", self.attr_names.join(","))?;
        }
        if self.position == PositionClass::Subsequent {
            write!(f, "+")?;
        }
        Ok(())
    }
}

/// Computes the position class of each child in a sibling list
pub fn position_classes(children: &[Node]) -> Vec<PositionClass> {
    let mut seen_tags = HashSet::new();
    children
        .iter()
        .map(|child| {
            if seen_tags.insert(child.tag.as_str()) {
                PositionClass::First
            } else {
                PositionClass::Subsequent
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(tag: &str, attrs: &[(&str, &str)]) -> Node {
        let mut node = Node::new(tag);
        for (name, value) in attrs {
            node.attributes.insert(name.to_string(), value.to_string());
        }
        node
    }

    #[test]
    fn test_attribute_values_do_not_matter() {
        let a = node("a", &[("href", "/x"), ("class", "link")]);
        let b = node("a", &[("class", "other"), ("href", "/y")]);
        assert_eq!(
            AlignmentSignature::of(&a, PositionClass::First),
            AlignmentSignature::of(&b, PositionClass::First)
        );
    }

    #[test]
    fn test_attribute_names_and_position_matter() {
        let a = node("div", &[("class", "x")]);
        let b = node("div", &[("id", "x")]);
        assert_ne!(
            AlignmentSignature::of(&a, PositionClass::First),
            AlignmentSignature::of(&b, PositionClass::First)
        );
        assert_ne!(
            AlignmentSignature::of(&a, PositionClass::First),
            AlignmentSignature::of(&a, PositionClass::Subsequent)
        );
    }

    #[test]
    fn test_position_classes() {
        let children = vec![node("h1", &[]), node("p", &[]), node("p", &[]), node("ul", &[])];
        assert_eq!(
            position_classes(&children),
            vec![
                PositionClass::First,
                PositionClass::First,
                PositionClass::Subsequent,
                PositionClass::First
            ]
        );
    }

    #[test]
    fn test_display() {
        let sig = AlignmentSignature::of(&node("span", &[("class", "p")]), PositionClass::Subsequent);
        assert_eq!(sig.to_string(), "span[class]+");
    }
}
