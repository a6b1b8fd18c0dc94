use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snapdiff_core::{
    Algorithm, DiffOptions, Hash, Node, Repository, RepositoryLock, compose_path, diff_snapshots,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Snapdiff - compare snapshots of a content-addressed backup repository
#[derive(Parser)]
#[command(name = "snapdiff")]
#[command(about = "Show differences between repository snapshots", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository directory (defaults to SNAPDIFF_REPOSITORY env var or ./snapdiff-repo)
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Do not take the repository lock (also set by SNAPDIFF_NO_LOCK=1)
    #[arg(long, global = true)]
    no_lock: bool,

    /// Only print changes and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository
    Init {
        /// Hash algorithm to use
        #[arg(long, default_value = "blake3")]
        algo: String,
    },

    /// List snapshots, oldest first
    Snapshots,

    /// List the files in a snapshot
    Ls {
        /// Snapshot ID, ID prefix, ref name, tag or "latest"
        snapshot: String,

        /// Show type, mode and size
        #[arg(short, long)]
        long: bool,
    },

    /// Show differences between two snapshots
    Diff {
        /// The two snapshots to compare, old then new
        snapshots: Vec<String>,
    },

    /// Manage named snapshot references
    #[command(subcommand)]
    Refs(RefsCommands),
}

#[derive(Subcommand)]
enum RefsCommands {
    /// Point a reference at a snapshot
    Add {
        /// Reference name
        name: String,

        /// Snapshot to reference
        snapshot: String,
    },

    /// List all references
    List,

    /// Remove a reference
    Rm {
        /// Reference name
        name: String,
    },
}

/// Global options shared by every command.
struct Globals {
    root: PathBuf,
    no_lock: bool,
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    // Repository location: CLI arg > SNAPDIFF_REPOSITORY env var > ./snapdiff-repo default
    let root = cli
        .repo
        .or_else(|| std::env::var("SNAPDIFF_REPOSITORY").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./snapdiff-repo"));

    let ctx = Globals {
        root,
        no_lock: cli.no_lock || env_flag("SNAPDIFF_NO_LOCK"),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Init { algo } => cmd_init(&ctx.root, &algo),
        Commands::Snapshots => cmd_snapshots(&ctx),
        Commands::Ls { snapshot, long } => cmd_ls(&ctx, &snapshot, long),
        Commands::Diff { snapshots } => cmd_diff(&ctx, &snapshots),
        Commands::Refs(refs_cmd) => match refs_cmd {
            RefsCommands::Add { name, snapshot } => cmd_refs_add(&ctx, &name, &snapshot),
            RefsCommands::List => cmd_refs_list(&ctx),
            RefsCommands::Rm { name } => cmd_refs_rm(&ctx, &name),
        },
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

fn open_repository(root: &Path) -> Result<Repository> {
    let mut repo = Repository::open(root)
        .with_context(|| format!("Failed to open repository at {}", root.display()))?;
    repo.load_index()
        .with_context(|| format!("Failed to load index of {}", root.display()))?;
    Ok(repo)
}

fn lock_repository(ctx: &Globals, repo: &Repository) -> Result<Option<RepositoryLock>> {
    if ctx.no_lock {
        return Ok(None);
    }
    let lock = repo
        .lock()
        .with_context(|| format!("Failed to lock repository at {}", ctx.root.display()))?;
    Ok(Some(lock))
}

fn resolve_snapshot(repo: &Repository, desc: &str) -> Result<Hash> {
    repo.find_snapshot(desc)
        .with_context(|| format!("Failed to find snapshot {}", desc))
}

fn cmd_init(root: &Path, algo: &str) -> Result<()> {
    let algorithm = match algo {
        "blake3" | "blake3-256" => Algorithm::Blake3,
        _ => anyhow::bail!("Unsupported algorithm: {}", algo),
    };

    Repository::init(root, algorithm)
        .with_context(|| format!("Failed to initialize repository at {}", root.display()))?;

    println!("Initialized snapdiff repository at {}", root.display());
    println!("Algorithm: {}", algorithm.as_str());

    Ok(())
}

fn cmd_snapshots(ctx: &Globals) -> Result<()> {
    let repo = open_repository(&ctx.root)?;
    let _lock = lock_repository(ctx, &repo)?;

    let snapshots = repo
        .list_snapshots()
        .with_context(|| "Failed to list snapshots")?;

    if snapshots.is_empty() {
        if !ctx.quiet {
            println!("No snapshots");
        }
        return Ok(());
    }

    for snapshot in snapshots {
        println!(
            "{}  {}  {:<12} {:<16} {}",
            snapshot.short_id(),
            snapshot.time.format("%Y-%m-%d %H:%M:%S"),
            snapshot.hostname,
            snapshot.tags.join(","),
            snapshot.paths.join(" ")
        );
    }

    Ok(())
}

fn cmd_ls(ctx: &Globals, desc: &str, long: bool) -> Result<()> {
    let repo = open_repository(&ctx.root)?;
    let _lock = lock_repository(ctx, &repo)?;

    let id = resolve_snapshot(&repo, desc)?;
    let snapshot = repo
        .load_snapshot(&id)
        .with_context(|| format!("Failed to load snapshot {}", id))?;
    let tree = snapshot
        .tree
        .with_context(|| format!("snapshot {} has nil tree", snapshot.short_id()))?;

    if !ctx.quiet {
        println!(
            "snapshot {} of [{}] at {}:",
            snapshot.short_id(),
            snapshot.paths.join(" "),
            snapshot.time.to_rfc3339()
        );
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    list_tree(&repo, "/", &tree, long, &mut handle)?;
    handle.flush()?;

    Ok(())
}

/// Print every node under `tree` depth-first, directories before their contents.
fn list_tree(
    repo: &Repository,
    prefix: &str,
    tree: &Hash,
    long: bool,
    out: &mut impl Write,
) -> Result<()> {
    let tree = repo
        .load_tree(tree)
        .with_context(|| format!("Failed to load tree {} at {}", tree, prefix))?;

    for node in &tree.nodes {
        let path = compose_path(prefix, &node.name);
        print_node(node, &path, long, out)?;

        if node.is_dir()
            && let Some(subtree) = &node.subtree
        {
            list_tree(repo, &path, subtree, long, out)?;
        }
    }

    Ok(())
}

fn print_node(node: &Node, path: &str, long: bool, out: &mut impl Write) -> Result<()> {
    let suffix = if node.is_dir() { "/" } else { "" };
    if long {
        writeln!(
            out,
            "{:<7} {:06o} {:>10} {}  {}{}",
            node.node_type.as_str(),
            node.metadata.mode,
            node.metadata.size,
            node.metadata.mtime.format("%Y-%m-%d %H:%M:%S"),
            path,
            suffix
        )?;
    } else {
        writeln!(out, "{}{}", path, suffix)?;
    }
    Ok(())
}

fn cmd_diff(ctx: &Globals, snapshots: &[String]) -> Result<()> {
    // No cancel token: Ctrl-C ends the process outright
    let opts = DiffOptions {
        no_lock: ctx.no_lock,
        quiet: ctx.quiet,
        cancel: None,
    };

    let stdout = io::stdout();
    let stats = diff_snapshots(&ctx.root, snapshots, &opts, stdout.lock())
        .with_context(|| "Failed to compare snapshots")?;

    if stats.subtree_errors > 0 {
        tracing::warn!(
            errors = stats.subtree_errors,
            "some subtrees could not be compared"
        );
    }

    Ok(())
}

fn cmd_refs_add(ctx: &Globals, name: &str, desc: &str) -> Result<()> {
    let repo = open_repository(&ctx.root)?;
    let _lock = lock_repository(ctx, &repo)?;

    let id = resolve_snapshot(&repo, desc)?;
    repo.refs()
        .add(name, &id)
        .with_context(|| format!("Failed to add reference: {}", name))?;

    println!("{} -> {}", name, id);

    Ok(())
}

fn cmd_refs_list(ctx: &Globals) -> Result<()> {
    let repo = open_repository(&ctx.root)?;

    let refs = repo
        .refs()
        .list()
        .with_context(|| "Failed to list references")?;

    if refs.is_empty() {
        if !ctx.quiet {
            println!("No references");
        }
    } else {
        for (name, id) in refs {
            println!("{} -> {}", name, id);
        }
    }

    Ok(())
}

fn cmd_refs_rm(ctx: &Globals, name: &str) -> Result<()> {
    let repo = open_repository(&ctx.root)?;
    let _lock = lock_repository(ctx, &repo)?;

    repo.refs()
        .remove(name)
        .with_context(|| format!("Failed to remove reference: {}", name))?;

    println!("Removed reference: {}", name);

    Ok(())
}
