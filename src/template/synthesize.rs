//! Template synthesis
//!
//! Documents are linearized into pre-order sequences of `(depth, signature)`
//! keys and folded with an LCS: whatever survives is common, in order, to
//! every document. Surviving entries whose parent does not line up in every
//! document are pruned, the rest forms the skeleton, and everything that
//! differs between documents becomes a field.

use crate::template::align::lcs_pairs;
use crate::template::descriptor::{
    selector_step, Field, FieldTarget, Marking, SkeletonNode, TemplateDescriptor,
};
use crate::template::node::{Node, ParsedDocument};
use crate::template::reuse::fingerprint;
use crate::template::signature::{position_classes, AlignmentSignature, PositionClass};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Elements every parsed document has regardless of content
const SCAFFOLDING: &[&str] = &["html", "head", "body"];

/// Errors raised by template synthesis
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("No documents to synthesize a template from")]
    NoDocuments,

    #[error("Documents share no common structure")]
    NoCommonStructure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AlignKey {
    depth: u32,
    signature: AlignmentSignature,
}

struct FlatNode<'a> {
    key: AlignKey,
    parent: Option<usize>,
    node: &'a Node,
}

/// A skeleton entry with its matched node in each document
struct Kept<'a> {
    /// Matched flat index per document
    indices: Vec<usize>,
    nodes: Vec<&'a Node>,
    parent: Option<usize>,
    attributes: BTreeMap<String, Option<String>>,
    text_varies: bool,
    marking: Marking,
    step: String,
}

/// Nodes hanging under a skeleton node on some pages only
struct Extra {
    parent: usize,
    step: String,
    base_name: String,
    samples: Vec<String>,
}

fn linearize(root: &Node) -> Vec<FlatNode<'_>> {
    let mut flat = Vec::with_capacity(root.size());
    visit(root, PositionClass::First, 0, None, &mut flat);
    flat
}

fn visit<'a>(
    node: &'a Node,
    position: PositionClass,
    depth: u32,
    parent: Option<usize>,
    flat: &mut Vec<FlatNode<'a>>,
) {
    let index = flat.len();
    flat.push(FlatNode {
        key: AlignKey {
            depth,
            signature: AlignmentSignature::of(node, position),
        },
        parent,
        node,
    });

    for (child, position) in node.children.iter().zip(position_classes(&node.children)) {
        visit(child, position, depth + 1, Some(index), flat);
    }
}

fn keys<'a>(flat: &'a [FlatNode<'_>]) -> Vec<&'a AlignKey> {
    flat.iter().map(|f| &f.key).collect()
}

/// Field name of a node: its first class, else its id, else its tag
fn base_name(node: &Node) -> String {
    node.attributes
        .get("class")
        .and_then(|c| c.split_whitespace().next())
        .or_else(|| node.attributes.get("id").map(String::as_str))
        .filter(|n| !n.is_empty())
        .unwrap_or(&node.tag)
        .to_string()
}

fn push_unique(samples: &mut Vec<String>, value: String) {
    if !samples.contains(&value) {
        samples.push(value);
    }
}

/// Synthesizes a template from a batch of documents
///
/// A single document yields its own structure as the skeleton, with no
/// fields.
///
/// # Returns
///
/// * `Ok(TemplateDescriptor)` - Skeleton and variant fields
/// * `Err(SynthesisError::NoDocuments)` - The batch is empty
/// * `Err(SynthesisError::NoCommonStructure)` - Nothing beyond the
///   `html`/`head`/`body` scaffolding is shared by every document
pub fn synthesize(documents: &[ParsedDocument]) -> Result<TemplateDescriptor, SynthesisError> {
    let first = documents.first().ok_or(SynthesisError::NoDocuments)?;
    if documents.len() == 1 {
        return Ok(TemplateDescriptor {
            document_count: 1,
            skeleton: SkeletonNode::from(&first.root),
            fields: Vec::new(),
            input_hash: fingerprint(documents),
        });
    }

    let flats: Vec<Vec<FlatNode<'_>>> = documents.iter().map(|d| linearize(&d.root)).collect();

    // Fold: running-common := LCS(running-common, next document)
    let mut common: Vec<usize> = (0..flats[0].len()).collect();
    for flat in &flats[1..] {
        let common_keys: Vec<&AlignKey> = common.iter().map(|&i| &flats[0][i].key).collect();
        common = lcs_pairs(&common_keys, &keys(flat))
            .into_iter()
            .map(|(c, _)| common[c])
            .collect();
        tracing::trace!("{} entries common after fold step", common.len());
        if common.is_empty() {
            return Err(SynthesisError::NoCommonStructure);
        }
    }

    // Locate every common entry in every document
    let common_keys: Vec<&AlignKey> = common.iter().map(|&i| &flats[0][i].key).collect();
    let matches: Vec<Vec<Option<usize>>> = flats
        .iter()
        .map(|flat| {
            let mut located = vec![None; common_keys.len()];
            for (c, j) in lcs_pairs(&common_keys, &keys(flat)) {
                located[c] = Some(j);
            }
            located
        })
        .collect();

    let kept = keep_consistent(&flats, &matches, common.len());

    if kept
        .iter()
        .all(|k| SCAFFOLDING.contains(&k.nodes[0].tag.as_str()))
    {
        return Err(SynthesisError::NoCommonStructure);
    }

    let extras = collect_extras(&flats, &kept);
    let fields = build_fields(&kept, &extras);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); kept.len()];
    for (k, entry) in kept.iter().enumerate() {
        if let Some(parent) = entry.parent {
            children[parent].push(k);
        }
    }

    tracing::debug!(
        "Synthesized skeleton of {} nodes with {} fields from {} documents",
        kept.len(),
        fields.len(),
        documents.len()
    );

    Ok(TemplateDescriptor {
        document_count: documents.len(),
        skeleton: build_skeleton(&kept, &children, 0),
        fields,
        input_hash: fingerprint(documents),
    })
}

/// Keeps the common entries whose matched parents line up in every document
fn keep_consistent<'a>(
    flats: &[Vec<FlatNode<'a>>],
    matches: &[Vec<Option<usize>>],
    common_len: usize,
) -> Vec<Kept<'a>> {
    let mut kept: Vec<Kept<'a>> = Vec::new();
    // Matched index in the first document -> position in `kept`
    let mut by_first: HashMap<usize, usize> = HashMap::new();

    for c in 0..common_len {
        let Some(indices) = matches.iter().map(|m| m[c]).collect::<Option<Vec<usize>>>() else {
            continue;
        };

        let parent = match flats[0][indices[0]].parent {
            None => None,
            Some(p) => match by_first.get(&p) {
                Some(&k) => Some(k),
                None => continue,
            },
        };

        let consistent = flats.iter().enumerate().all(|(d, flat)| {
            let expected = parent.map(|k| kept[k].indices[d]);
            flat[indices[d]].parent == expected
        });
        if !consistent {
            continue;
        }

        let nodes: Vec<&Node> = flats
            .iter()
            .zip(&indices)
            .map(|(flat, &i)| flat[i].node)
            .collect();

        let reference = nodes[0];
        let text_varies = nodes.iter().any(|n| n.text != reference.text);
        let attributes: BTreeMap<String, Option<String>> = reference
            .attributes
            .iter()
            .map(|(name, value)| {
                let fixed = nodes.iter().all(|n| n.attributes.get(name) == Some(value));
                (name.clone(), fixed.then(|| value.clone()))
            })
            .collect();

        let marking = if text_varies || attributes.values().any(Option::is_none) {
            Marking::Variant
        } else {
            Marking::Invariant
        };
        let step = selector_step(
            &reference.tag,
            attributes.get("id").and_then(Option::as_deref),
            attributes.get("class").and_then(Option::as_deref),
        );

        by_first.insert(indices[0], kept.len());
        kept.push(Kept {
            indices,
            nodes,
            parent,
            attributes,
            text_varies,
            marking,
            step,
        });
    }

    kept
}

/// Groups unmatched subtrees by skeleton parent and signature
fn collect_extras(flats: &[Vec<FlatNode<'_>>], kept: &[Kept<'_>]) -> Vec<Extra> {
    let mut extras: Vec<Extra> = Vec::new();
    let mut groups: HashMap<(usize, AlignmentSignature), usize> = HashMap::new();

    for (d, flat) in flats.iter().enumerate() {
        let matched: HashMap<usize, usize> = kept
            .iter()
            .enumerate()
            .map(|(k, entry)| (entry.indices[d], k))
            .collect();

        for (i, entry) in flat.iter().enumerate() {
            if matched.contains_key(&i) {
                continue;
            }
            let Some(&parent) = entry.parent.and_then(|p| matched.get(&p)) else {
                continue;
            };

            let key = (parent, entry.key.signature.clone());
            let group = *groups.entry(key).or_insert_with(|| {
                extras.push(Extra {
                    parent,
                    step: selector_step(
                        &entry.node.tag,
                        entry.node.attributes.get("id").map(String::as_str),
                        entry.node.attributes.get("class").map(String::as_str),
                    ),
                    base_name: base_name(entry.node),
                    samples: Vec::new(),
                });
                extras.len() - 1
            });

            let text = entry.node.full_text();
            if !text.is_empty() {
                push_unique(&mut extras[group].samples, text);
            }
        }
    }

    extras
}

/// Steps from the root to `k`, split at the nearest invariant node
///
/// With `include_self` the node itself may serve as the anchor.
fn anchor_and_path(kept: &[Kept<'_>], k: usize, include_self: bool) -> (Vec<String>, Vec<String>) {
    let mut chain = Vec::new();
    let mut cursor = Some(k);
    while let Some(c) = cursor {
        chain.push(c);
        cursor = kept[c].parent;
    }
    chain.reverse();

    let last_candidate = if include_self { chain.len() } else { chain.len() - 1 };
    let split = chain[..last_candidate]
        .iter()
        .rposition(|&c| kept[c].marking == Marking::Invariant)
        .map_or(0, |pos| pos + 1);

    let steps: Vec<String> = chain.iter().map(|&c| kept[c].step.clone()).collect();
    let (anchor, path) = steps.split_at(split);
    (anchor.to_vec(), path.to_vec())
}

fn build_fields(kept: &[Kept<'_>], extras: &[Extra]) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut unique_name = |name: String| -> String {
        let mut candidate = name.clone();
        let mut n = 2;
        while !used.insert(candidate.clone()) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        candidate
    };

    for (k, entry) in kept.iter().enumerate() {
        let base = base_name(entry.nodes[0]);

        if entry.marking == Marking::Variant {
            let (anchor, path) = anchor_and_path(kept, k, false);

            if entry.text_varies {
                let mut samples = Vec::new();
                for node in &entry.nodes {
                    push_unique(&mut samples, node.text.clone().unwrap_or_default());
                }
                fields.push(Field {
                    name: unique_name(base.clone()),
                    anchor: anchor.clone(),
                    path: path.clone(),
                    target: FieldTarget::Text,
                    samples,
                });
            }

            for (attr, value) in &entry.attributes {
                if value.is_some() {
                    continue;
                }
                let mut samples = Vec::new();
                for node in &entry.nodes {
                    push_unique(
                        &mut samples,
                        node.attributes.get(attr).cloned().unwrap_or_default(),
                    );
                }
                fields.push(Field {
                    name: unique_name(format!("{}_{}", base, attr)),
                    anchor: anchor.clone(),
                    path: path.clone(),
                    target: FieldTarget::Attribute { name: attr.clone() },
                    samples,
                });
            }
        }

        for extra in extras.iter().filter(|e| e.parent == k) {
            let (anchor, mut path) = anchor_and_path(kept, k, true);
            path.push(extra.step.clone());
            fields.push(Field {
                name: unique_name(extra.base_name.clone()),
                anchor,
                path,
                target: FieldTarget::Subtree,
                samples: extra.samples.clone(),
            });
        }
    }

    fields
}

fn build_skeleton(kept: &[Kept<'_>], children: &[Vec<usize>], k: usize) -> SkeletonNode {
    let entry = &kept[k];
    SkeletonNode {
        tag: entry.nodes[0].tag.clone(),
        attributes: entry.attributes.clone(),
        text: if entry.text_varies {
            None
        } else {
            entry.nodes[0].text.clone()
        },
        marking: entry.marking,
        children: children[k]
            .iter()
            .map(|&child| build_skeleton(kept, children, child))
            .collect(),
    }
}
