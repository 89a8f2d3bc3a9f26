//! Structural template synthesis
//!
//! This module turns a batch of fetched pages into a template descriptor:
//! - Parsing page bodies into comparable node trees
//! - Fingerprinting nodes with alignment signatures
//! - Aligning documents with a longest-common-subsequence fold
//! - Separating the invariant skeleton from the variant fields
//! - Reusing an earlier descriptor when the documents are unchanged

mod align;
mod descriptor;
mod node;
mod reuse;
mod signature;
mod synthesize;

pub use align::lcs_pairs;
pub use descriptor::{Field, FieldTarget, Marking, SkeletonNode, TemplateDescriptor};
pub use node::{parse_document, Node, ParseError, ParsedDocument};
pub use reuse::{fingerprint, reuse_or_synthesize};
pub use signature::{position_classes, AlignmentSignature, PositionClass};
pub use synthesize::{synthesize, SynthesisError};
