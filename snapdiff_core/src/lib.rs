//! # Snapdiff Core
//!
//! Snapshot repository and tree differencing for a content-addressed backup
//! store.
//!
//! A repository holds immutable, BLAKE3-addressed objects: content blobs,
//! directory trees and snapshot records pointing at a root tree. This library
//! reads and writes that layout and compares two snapshots, reporting every
//! path that was added, removed or modified.
//!
//! ## Features
//!
//! - Content-addressed objects with integrity checks on every read
//! - Canonical, sorted tree encoding
//! - Snapshot lookup by ID, ID prefix, `latest`, ref name or tag
//! - Recursive tree diff with per-subtree error containment
//! - Exclusive repository lock released on every exit path
//!
//! ## Example
//!
//! ```no_run
//! use snapdiff_core::{DiffOptions, diff_snapshots};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = vec!["4f2a91c0".to_string(), "latest".to_string()];
//! let stats = diff_snapshots(
//!     Path::new("./backups"),
//!     &args,
//!     &DiffOptions::default(),
//!     std::io::stdout().lock(),
//! )?;
//! println!("{} changes", stats.changes());
//! # Ok(())
//! # }
//! ```

mod compare;
mod diff;
mod error;
mod hash;
mod lock;
mod object;
mod refs;
mod report;
mod repository;
mod snapshot;
mod tree;

pub use compare::{DiffOptions, diff_snapshots};
pub use diff::{
    CancelToken, ChangeFlags, ChangeKind, ChangeRecord, Comparison, Descend, DiffStats,
    TreeDiffer, TreeLoader, compare_nodes, compose_path, union_names,
};
pub use error::{Error, Result};
pub use hash::{Algorithm, Hash};
pub use lock::RepositoryLock;
pub use object::{CompressionType, ObjectHeader, ObjectType};
pub use refs::{RefManager, is_valid_ref_name};
pub use report::{DiffReporter, MARKER_WIDTH, format_record};
pub use repository::{LATEST, Repository};
pub use snapshot::Snapshot;
pub use tree::{FileMode, Metadata, Node, NodeType, Tree, content_equal, file_modes};
