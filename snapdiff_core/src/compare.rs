//! Snapshot comparison: the `diff` operation end to end.

use crate::diff::{CancelToken, DiffStats, TreeDiffer};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::report::DiffReporter;
use crate::repository::Repository;
use crate::snapshot::Snapshot;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Run-time options for [`diff_snapshots`].
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Skip taking the repository lock.
    pub no_lock: bool,
    /// Suppress the summary line.
    pub quiet: bool,
    /// Abort outstanding tree loads when cancelled. Only set by embedding
    /// programs; the CLI runs to completion.
    pub cancel: Option<CancelToken>,
}

/// Compare two snapshots of the repository at `root`, writing one line per
/// change to `out`.
///
/// `args` must hold exactly two snapshot descriptors (IDs, ID prefixes,
/// `latest`, ref names or tags). The repository lock, unless disabled, is
/// held for the whole comparison and released on every exit path.
pub fn diff_snapshots<W: Write>(
    root: &Path,
    args: &[String],
    opts: &DiffOptions,
    out: W,
) -> Result<DiffStats> {
    let [desc1, desc2] = args else {
        return Err(Error::argument("specify two snapshot IDs"));
    };

    let mut repo = Repository::open(root)?;
    repo.load_index()?;

    let _lock = if opts.no_lock {
        None
    } else {
        Some(repo.lock()?)
    };

    let sn1 = load_snapshot(&repo, desc1)?;
    let sn2 = load_snapshot(&repo, desc2)?;

    let tree1 = root_tree(&sn1)?;
    let tree2 = root_tree(&sn2)?;

    let mut reporter = DiffReporter::new(out);
    if !opts.quiet {
        reporter
            .note(&format!(
                "comparing snapshot {} to {}:",
                sn1.short_id(),
                sn2.short_id()
            ))
            .map_err(|source| Error::Output { source })?;
    }

    let mut differ = TreeDiffer::new(&repo, reporter);
    if let Some(token) = &opts.cancel {
        differ = differ.with_cancel(token.clone());
    }
    differ.diff("/", &tree1, &tree2)?;

    let (stats, mut reporter) = differ.finish();
    reporter.flush().map_err(|source| Error::Output { source })?;

    debug!(
        added = stats.added,
        removed = stats.removed,
        modified = stats.modified,
        subtree_errors = stats.subtree_errors,
        "diff finished"
    );

    Ok(stats)
}

fn load_snapshot(repo: &Repository, desc: &str) -> Result<Snapshot> {
    let id = repo.find_snapshot(desc)?;
    repo.load_snapshot(&id)
}

fn root_tree(snapshot: &Snapshot) -> Result<Hash> {
    snapshot
        .tree
        .ok_or_else(|| Error::snapshot_has_no_tree(snapshot.short_id()))
}
