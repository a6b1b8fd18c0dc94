//! Tree differencing.
//!
//! [`TreeDiffer`] walks two trees in lock-step, one directory level at a
//! time. At each level the names of both sides are merged into one sorted
//! list ([`union_names`]), every name is classified by [`compare_nodes`], and
//! non-empty classifications go to the [`DiffReporter`]. Directory pairs are
//! descended into depth-first, so output is pre-order and sorted per level.
//!
//! Failing to load the two root trees is an error. Failing to load anything
//! below them is logged and skipped so one bad subtree does not hide the
//! differences elsewhere.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::report::DiffReporter;
use crate::tree::{Node, NodeType, Tree, content_equal};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Source of trees for the differ.
pub trait TreeLoader {
    /// Load the tree with the given hash.
    fn load_tree(&self, id: &Hash) -> Result<Tree>;
}

/// Cooperative cancellation flag shared between a caller and a differ.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What changed about an entry present on both sides.
///
/// Rendered as `T`, `C`, `M`, always in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    pub type_changed: bool,
    pub content_changed: bool,
    pub metadata_changed: bool,
}

impl ChangeFlags {
    pub fn is_empty(&self) -> bool {
        !(self.type_changed || self.content_changed || self.metadata_changed)
    }
}

impl fmt::Display for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::with_capacity(3);
        if self.type_changed {
            s.push('T');
        }
        if self.content_changed {
            s.push('C');
        }
        if self.metadata_changed {
            s.push('M');
        }
        // Padding flags like `{:<4}` apply to the whole string
        f.pad(&s)
    }
}

/// Kind of a reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified(ChangeFlags),
}

impl ChangeKind {
    /// Marker printed in front of the path.
    pub fn marker(&self) -> String {
        match self {
            ChangeKind::Added => "+".to_string(),
            ChangeKind::Removed => "-".to_string(),
            ChangeKind::Modified(flags) => flags.to_string(),
        }
    }
}

/// One detected difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Path from the snapshot root, without a trailing separator.
    pub path: String,
    pub kind: ChangeKind,
    /// Whether the entry is a directory (on the second side, if present).
    pub is_dir: bool,
}

impl ChangeRecord {
    /// Path as displayed: directories get a trailing `/`.
    pub fn display_path(&self) -> String {
        if self.is_dir {
            format!("{}/", self.path)
        } else {
            self.path.clone()
        }
    }
}

/// A directory pair to descend into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descend {
    /// Prefix for the children, with a trailing `/`.
    pub prefix: String,
    pub subtree1: Option<Hash>,
    pub subtree2: Option<Hash>,
}

/// Outcome of comparing the two nodes stored under one name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub record: Option<ChangeRecord>,
    pub descend: Option<Descend>,
}

/// Totals for one diff run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    /// Subtrees that could not be compared (logged as warnings).
    pub subtree_errors: usize,
}

impl DiffStats {
    /// Number of change lines reported.
    pub fn changes(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

/// Join `prefix` and `name` with exactly one `/`.
pub fn compose_path(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

/// Sorted union of the entry names of two sibling node lists.
///
/// Names present on both sides appear once. Order is bytewise ascending.
pub fn union_names<'a>(nodes1: &'a [Node], nodes2: &'a [Node]) -> Vec<&'a str> {
    let mut names: Vec<&str> = nodes1
        .iter()
        .chain(nodes2)
        .map(|n| n.name.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Classify the nodes stored under `name` on each side.
pub fn compare_nodes(
    prefix: &str,
    name: &str,
    node1: Option<&Node>,
    node2: Option<&Node>,
) -> Comparison {
    let path = compose_path(prefix, name);

    match (node1, node2) {
        (Some(node1), None) => Comparison {
            record: Some(ChangeRecord {
                path,
                kind: ChangeKind::Removed,
                is_dir: node1.is_dir(),
            }),
            descend: None,
        },
        (None, Some(node2)) => Comparison {
            record: Some(ChangeRecord {
                path,
                kind: ChangeKind::Added,
                is_dir: node2.is_dir(),
            }),
            descend: None,
        },
        (Some(node1), Some(node2)) => {
            let mut flags = ChangeFlags {
                type_changed: node1.node_type != node2.node_type,
                ..ChangeFlags::default()
            };

            if node1.is_file() && node2.is_file() && !content_equal(&node1.content, &node2.content)
            {
                flags.content_changed = true;
                // Full equality includes content, so this always holds here
                flags.metadata_changed = !node1.equals(node2);
            } else {
                flags.metadata_changed = !node1.equals(node2);
            }

            let is_dir = node2.node_type == NodeType::Dir;
            let descend = (node1.is_dir() && node2.is_dir()).then(|| Descend {
                prefix: format!("{}/", path),
                subtree1: node1.subtree,
                subtree2: node2.subtree,
            });

            Comparison {
                record: (!flags.is_empty()).then(|| ChangeRecord {
                    path,
                    kind: ChangeKind::Modified(flags),
                    is_dir,
                }),
                descend,
            }
        }
        (None, None) => Comparison::default(),
    }
}

/// Recursive two-tree comparison writing to a [`DiffReporter`].
pub struct TreeDiffer<'a, L: TreeLoader + ?Sized, W: Write> {
    loader: &'a L,
    reporter: DiffReporter<W>,
    cancel: Option<CancelToken>,
    stats: DiffStats,
}

impl<'a, L: TreeLoader + ?Sized, W: Write> TreeDiffer<'a, L, W> {
    pub fn new(loader: &'a L, reporter: DiffReporter<W>) -> Self {
        Self {
            loader,
            reporter,
            cancel: None,
            stats: DiffStats::default(),
        }
    }

    /// Stop loading trees once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn stats(&self) -> DiffStats {
        self.stats
    }

    /// Consume the differ, returning the totals and the reporter.
    pub fn finish(self) -> (DiffStats, DiffReporter<W>) {
        (self.stats, self.reporter)
    }

    fn load(&self, id: &Hash) -> Result<Tree> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::tree_load(id.to_hex(), Error::Cancelled));
        }
        self.loader
            .load_tree(id)
            .map_err(|e| Error::tree_load(id.to_hex(), e))
    }

    /// Compare the trees `id1` and `id2`, reporting paths under `prefix`.
    ///
    /// Errors loading these two trees are returned. Errors from nested
    /// subtrees are logged and counted in [`DiffStats::subtree_errors`].
    /// Failing to write output is always returned.
    pub fn diff(&mut self, prefix: &str, id1: &Hash, id2: &Hash) -> Result<()> {
        debug!(%prefix, tree1 = %id1.short(), tree2 = %id2.short(), "diffing trees");

        let tree1 = self.load(id1)?;
        let tree2 = self.load(id2)?;

        let nodes1: HashMap<&str, &Node> =
            tree1.nodes.iter().map(|n| (n.name.as_str(), n)).collect();
        let nodes2: HashMap<&str, &Node> =
            tree2.nodes.iter().map(|n| (n.name.as_str(), n)).collect();

        for name in union_names(&tree1.nodes, &tree2.nodes) {
            let comparison = compare_nodes(
                prefix,
                name,
                nodes1.get(name).copied(),
                nodes2.get(name).copied(),
            );

            if let Some(record) = &comparison.record {
                self.reporter
                    .report(record)
                    .map_err(|source| Error::Output { source })?;
                match record.kind {
                    ChangeKind::Added => self.stats.added += 1,
                    ChangeKind::Removed => self.stats.removed += 1,
                    ChangeKind::Modified(_) => self.stats.modified += 1,
                }
            }

            if let Some(descend) = comparison.descend {
                self.descend(descend)?;
            }
        }

        Ok(())
    }

    /// Recurse into a directory pair, containing any failure to a warning.
    fn descend(&mut self, descend: Descend) -> Result<()> {
        let (Some(subtree1), Some(subtree2)) = (descend.subtree1, descend.subtree2) else {
            warn!(path = %descend.prefix, "directory has no subtree, skipping");
            self.stats.subtree_errors += 1;
            return Ok(());
        };

        match self.diff(&descend.prefix, &subtree1, &subtree2) {
            Ok(()) => Ok(()),
            Err(err @ Error::Output { .. }) => Err(err),
            Err(err) => {
                warn!(path = %descend.prefix, error = %err, "error comparing subtree");
                self.stats.subtree_errors += 1;
                Ok(())
            }
        }
    }
}
