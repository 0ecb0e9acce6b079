//! YAML document handling: traversal with in-place substitution, and
//! round-tripping to the working file.

pub mod serializer;
pub mod walker;

pub use serializer::{
    WORKING_FILE_EXTENSION, load_document, parse_document, render_document, working_file_name,
    write_working_file,
};
pub(crate) use walker::key_segment;
pub use walker::{
    Entry, NodeOutcome, NodeVisitor, OutcomeStatus, TreePath, Visit, WalkReport, Walker,
};
