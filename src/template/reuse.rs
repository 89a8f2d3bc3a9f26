//! Reuse of earlier synthesis results
//!
//! Every descriptor records a fingerprint of the documents it was built
//! from. When a later run collects the same documents in the same order, the
//! stored descriptor is returned instead of aligning everything again.

use crate::template::descriptor::TemplateDescriptor;
use crate::template::node::{Node, ParsedDocument};
use crate::template::synthesize::{synthesize, SynthesisError};
use sha2::{Digest, Sha256};

/// Computes a SHA-256 fingerprint of a document batch
///
/// Tags, attributes, own text and tree shape of every document are hashed
/// in order, so reordering the batch changes the fingerprint.
pub fn fingerprint(documents: &[ParsedDocument]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((documents.len() as u64).to_le_bytes());
    for document in documents {
        hash_tree(&mut hasher, &document.root);
    }
    hex::encode(hasher.finalize())
}

fn hash_tree(hasher: &mut Sha256, root: &Node) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        hasher.update(node.tag.as_bytes());
        hasher.update([0]);
        for (name, value) in &node.attributes {
            hasher.update(name.as_bytes());
            hasher.update([1]);
            hasher.update(value.as_bytes());
            hasher.update([0]);
        }
        if let Some(text) = &node.text {
            hasher.update([2]);
            hasher.update(text.as_bytes());
        }
        hasher.update((node.children.len() as u64).to_le_bytes());
        stack.extend(node.children.iter().rev());
    }
}

/// Returns `previous` when it was synthesized from the same documents,
/// otherwise synthesizes a new descriptor
pub fn reuse_or_synthesize(
    documents: &[ParsedDocument],
    previous: Option<TemplateDescriptor>,
) -> Result<TemplateDescriptor, SynthesisError> {
    if let Some(previous) = previous {
        if !previous.input_hash.is_empty() && previous.input_hash == fingerprint(documents) {
            tracing::info!(
                "Documents unchanged since the last synthesis, reusing template ({} fields)",
                previous.fields.len()
            );
            return Ok(previous);
        }
        tracing::debug!("Documents changed since the last synthesis");
    }
    synthesize(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_document;

    fn doc(body: &str) -> ParsedDocument {
        parse_document(body, "text/html").unwrap()
    }

    fn batch() -> Vec<ParsedDocument> {
        vec![
            doc(r#"<p class="price">$1</p>"#),
            doc(r#"<p class="price">$2</p>"#),
        ]
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint(&batch()), fingerprint(&batch()));
        assert_eq!(fingerprint(&batch()).len(), 64);
    }

    #[test]
    fn test_fingerprint_sees_content_order_and_shape() {
        let base = fingerprint(&batch());

        let mut reordered = batch();
        reordered.reverse();
        assert_ne!(fingerprint(&reordered), base);

        let mut edited = batch();
        edited[1] = doc(r#"<p class="price">$3</p>"#);
        assert_ne!(fingerprint(&edited), base);

        // Same tags in pre-order, different nesting
        let siblings = vec![doc("<section><div></div><div></div></section>")];
        let nested = vec![doc("<section><div><div></div></div></section>")];
        assert_ne!(fingerprint(&siblings), fingerprint(&nested));
    }

    #[test]
    fn test_unchanged_documents_reuse_previous_template() {
        let mut previous = synthesize(&batch()).unwrap();
        assert_eq!(previous.input_hash, fingerprint(&batch()));
        previous.fields[0].name = "renamed".to_string();

        let reused = reuse_or_synthesize(&batch(), Some(previous.clone())).unwrap();
        assert_eq!(reused, previous);
    }

    #[test]
    fn test_changed_documents_are_synthesized_again() {
        let previous = synthesize(&batch()).unwrap();

        let mut documents = batch();
        documents.push(doc(r#"<p class="price">$3</p>"#));
        let fresh = reuse_or_synthesize(&documents, Some(previous)).unwrap();

        assert_eq!(fresh.document_count, 3);
        assert_eq!(fresh.fields[0].samples, vec!["$1", "$2", "$3"]);
    }

    #[test]
    fn test_descriptor_without_fingerprint_is_never_reused() {
        let mut previous = synthesize(&batch()).unwrap();
        previous.input_hash.clear();
        previous.document_count = 99;

        let fresh = reuse_or_synthesize(&batch(), Some(previous)).unwrap();
        assert_eq!(fresh.document_count, 2);
    }
}
