//! Repository management and object I/O.

use crate::diff::TreeLoader;
use crate::error::{Error, Result};
use crate::hash::{Algorithm, Hash};
use crate::lock::RepositoryLock;
use crate::object::{CompressionType, HEADER_SIZE, ObjectHeader, ObjectType};
use crate::refs::{RefManager, is_valid_ref_name};
use crate::snapshot::Snapshot;
use crate::tree::Tree;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compression threshold: blobs >= 4KB are compressed.
const COMPRESSION_THRESHOLD: usize = 4096;

/// Keyword resolving to the most recent snapshot.
pub const LATEST: &str = "latest";

/// In-memory list of the objects and snapshots present on disk.
#[derive(Debug, Default)]
struct Index {
    objects: HashSet<Hash>,
    snapshots: BTreeSet<Hash>,
}

/// A snapshot repository.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    algorithm: Algorithm,
    index: Option<Index>,
}

impl Repository {
    /// Initialize a new repository at the given path.
    ///
    /// Creates the directory structure:
    /// - `objects/blake3-256/` for blobs and trees
    /// - `snapshots/` for snapshot records
    /// - `refs/` for named snapshot references
    /// - `config` file with version and algorithm
    pub fn init<P: AsRef<Path>>(root: P, algorithm: Algorithm) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if root.join("config").exists() {
            return Err(Error::invalid_repository(&root, "already initialized"));
        }

        fs::create_dir_all(root.join("objects").join(algorithm.as_str()))?;
        fs::create_dir_all(root.join("snapshots"))?;
        fs::create_dir_all(root.join("refs"))?;

        let config_content = format!("version=1\nalgo={}\n", algorithm.as_str());
        fs::write(root.join("config"), config_content)?;

        debug!(root = %root.display(), "initialized repository");

        Ok(Self {
            root,
            algorithm,
            index: None,
        })
    }

    /// Open an existing repository at the given path.
    ///
    /// Validates the layout and reads the configuration. The index is not
    /// loaded; call [`Repository::load_index`] before looking anything up.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_repository(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_repository(&root, "config file not found"));
        }

        let config_content = fs::read_to_string(&config_path)?;
        let algorithm = Self::parse_config(&root, &config_content)?;

        for (dir, what) in [
            (root.join("objects").join(algorithm.as_str()), "objects directory"),
            (root.join("snapshots"), "snapshots directory"),
            (root.join("refs"), "refs directory"),
        ] {
            if !dir.is_dir() {
                return Err(Error::invalid_repository(&root, format!("{} missing", what)));
            }
        }

        Ok(Self {
            root,
            algorithm,
            index: None,
        })
    }

    /// Parse the config file to extract the algorithm.
    fn parse_config(root: &Path, content: &str) -> Result<Algorithm> {
        let mut version = None;
        let mut algo = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::invalid_repository(
                root,
                format!("unsupported config version: {:?}", version),
            ));
        }

        let algo_str =
            algo.ok_or_else(|| Error::invalid_repository(root, "missing algo in config"))?;
        Algorithm::parse(algo_str)
    }

    /// Get the path to an object file given its hash.
    ///
    /// Returns: `objects/{algorithm}/{prefix}/{suffix}`
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        self.objects_dir().join(hash.prefix()).join(hash.suffix())
    }

    /// Get the path to a snapshot file given its ID.
    pub fn snapshot_path(&self, id: &Hash) -> PathBuf {
        self.root.join("snapshots").join(id.to_hex())
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects").join(self.algorithm.as_str())
    }

    /// Get the root directory of the repository.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the algorithm used by this repository.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Get the reference manager for this repository.
    pub fn refs(&self) -> RefManager<'_> {
        RefManager::new(self)
    }

    /// Acquire the repository-wide lock.
    ///
    /// The lock is released when the returned guard is dropped.
    pub fn lock(&self) -> Result<RepositoryLock> {
        RepositoryLock::acquire(self.root.join("lock"))
    }

    /// Scan the repository and build the in-memory index.
    pub fn load_index(&mut self) -> Result<()> {
        let mut index = Index::default();

        for shard in fs::read_dir(self.objects_dir())? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().into_owned();

            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let name = entry.file_name();
                // Tempfiles from interrupted writes are not hex and get skipped
                if let Some(suffix) = name.to_str()
                    && let Ok(hash) = Hash::from_hex(&format!("{}{}", prefix, suffix))
                {
                    index.objects.insert(hash);
                }
            }
        }

        for entry in fs::read_dir(self.root.join("snapshots"))? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str()
                && let Ok(id) = Hash::from_hex(name)
            {
                index.snapshots.insert(id);
            }
        }

        debug!(
            objects = index.objects.len(),
            snapshots = index.snapshots.len(),
            "loaded repository index"
        );

        self.index = Some(index);
        Ok(())
    }

    /// Whether [`Repository::load_index`] has been called.
    pub fn is_index_loaded(&self) -> bool {
        self.index.is_some()
    }

    fn index(&self) -> Result<&Index> {
        self.index.as_ref().ok_or(Error::IndexNotLoaded)
    }

    fn ensure_object(&self, hash: &Hash) -> Result<()> {
        if self.index()?.objects.contains(hash) {
            Ok(())
        } else {
            Err(Error::object_not_found(hash.to_hex()))
        }
    }

    /// Write an object atomically using tempfile.
    fn write_object_atomic(path: &Path, header: &ObjectHeader, payload: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::corrupted_object(path, "object path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&header.encode())?;
        temp_file.write_all(payload)?;
        temp_file.flush()?;
        temp_file.persist(path)?;

        Ok(())
    }

    /// Read, decompress and verify an object of the expected type.
    fn read_object(&self, path: &Path, hash: &Hash, expected: ObjectType) -> Result<Vec<u8>> {
        if !path.exists() {
            return Err(Error::object_not_found(hash.to_hex()));
        }

        let data = fs::read(path)?;
        let header = ObjectHeader::decode(&data)?;

        if header.object_type != expected {
            return Err(Error::invalid_object_type(
                expected.as_str(),
                header.object_type.as_str(),
            ));
        }

        let stored = &data[HEADER_SIZE..];
        if stored.len() as u64 != header.payload_len {
            return Err(Error::corrupted_object(
                path,
                format!(
                    "Payload length mismatch: expected {}, got {}",
                    header.payload_len,
                    stored.len()
                ),
            ));
        }

        let payload = match header.compression {
            CompressionType::None => stored.to_vec(),
            CompressionType::Zstd => decompress_zstd(stored)?,
        };

        // Verify hash matches uncompressed data (corruption detection)
        let computed_hash = Hash::hash_bytes(&payload);
        if computed_hash != *hash {
            return Err(Error::corrupted_object(
                path,
                format!(
                    "Hash mismatch: expected {}, got {}",
                    hash.to_hex(),
                    computed_hash.to_hex()
                ),
            ));
        }

        Ok(payload)
    }

    /// Store a content-addressed object, skipping the write if it exists.
    fn put_object(&mut self, object_type: ObjectType, payload: &[u8]) -> Result<Hash> {
        let hash = Hash::hash_bytes(payload);
        let obj_path = self.object_path(&hash);

        if !obj_path.exists() {
            let (stored, compression) =
                if object_type == ObjectType::Blob && payload.len() >= COMPRESSION_THRESHOLD {
                    (compress_zstd(payload)?, CompressionType::Zstd)
                } else {
                    (payload.to_vec(), CompressionType::None)
                };

            let header =
                ObjectHeader::new(object_type, self.algorithm, compression, stored.len() as u64);
            Self::write_object_atomic(&obj_path, &header, &stored)?;
        }

        if let Some(index) = self.index.as_mut() {
            index.objects.insert(hash);
        }

        Ok(hash)
    }

    /// Store one content block. Blocks of 4KB or more are zstd-compressed.
    pub fn put_blob(&mut self, data: &[u8]) -> Result<Hash> {
        self.put_object(ObjectType::Blob, data)
    }

    /// Retrieve a content block by hash.
    ///
    /// Diffing only compares content hashes and never reads blocks back; this
    /// is the read path for tools that restore or inspect file data.
    pub fn get_blob(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.ensure_object(hash)?;
        self.read_object(&self.object_path(hash), hash, ObjectType::Blob)
    }

    /// Store a tree. Returns the hash of its canonical encoding.
    pub fn put_tree(&mut self, tree: &Tree) -> Result<Hash> {
        let payload = tree.encode()?;
        self.put_object(ObjectType::Tree, &payload)
    }

    /// Load a tree by hash.
    pub fn load_tree(&self, hash: &Hash) -> Result<Tree> {
        self.ensure_object(hash)?;
        let payload = self.read_object(&self.object_path(hash), hash, ObjectType::Tree)?;
        Tree::decode(&payload)
    }

    /// Store a snapshot record. Returns its ID.
    pub fn put_snapshot(&mut self, snapshot: &Snapshot) -> Result<Hash> {
        let payload = snapshot.encode()?;
        let id = Hash::hash_bytes(&payload);
        let path = self.snapshot_path(&id);

        if !path.exists() {
            let header = ObjectHeader::new(
                ObjectType::Snapshot,
                self.algorithm,
                CompressionType::None,
                payload.len() as u64,
            );
            Self::write_object_atomic(&path, &header, &payload)?;
        }

        if let Some(index) = self.index.as_mut() {
            index.snapshots.insert(id);
        }

        debug!(id = %id.short(), "stored snapshot");
        Ok(id)
    }

    /// Load a snapshot record by ID.
    pub fn load_snapshot(&self, id: &Hash) -> Result<Snapshot> {
        if !self.index()?.snapshots.contains(id) {
            return Err(Error::snapshot_not_found(id.to_hex()));
        }

        let payload = self.read_object(&self.snapshot_path(id), id, ObjectType::Snapshot)?;
        Ok(Snapshot::decode(&payload)?.with_id(*id))
    }

    /// All snapshots, oldest first (ties broken by ID).
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = self
            .index()?
            .snapshots
            .iter()
            .map(|id| self.load_snapshot(id))
            .collect::<Result<Vec<_>>>()?;

        snapshots.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id().cmp(&b.id())));
        Ok(snapshots)
    }

    /// Resolve a snapshot descriptor to a snapshot ID.
    ///
    /// Tried in order: `latest`, a ref name, a full ID, a unique ID prefix,
    /// then a unique tag or description.
    pub fn find_snapshot(&self, desc: &str) -> Result<Hash> {
        let index = self.index()?;

        if desc == LATEST {
            return self
                .list_snapshots()?
                .last()
                .and_then(Snapshot::id)
                .ok_or_else(|| Error::snapshot_not_found(desc));
        }

        if is_valid_ref_name(desc)
            && let Some(id) = self.refs().get(desc)?
        {
            return Ok(id);
        }

        if let Ok(id) = Hash::from_hex(desc) {
            return if index.snapshots.contains(&id) {
                Ok(id)
            } else {
                Err(Error::snapshot_not_found(desc))
            };
        }

        let by_prefix: Vec<Hash> = index
            .snapshots
            .iter()
            .filter(|id| id.has_hex_prefix(desc))
            .copied()
            .collect();
        if !by_prefix.is_empty() {
            return unique_match(desc, by_prefix);
        }

        let by_label: Vec<Hash> = self
            .list_snapshots()?
            .iter()
            .filter(|s| s.matches_label(desc))
            .filter_map(Snapshot::id)
            .collect();
        unique_match(desc, by_label)
    }
}

impl TreeLoader for Repository {
    fn load_tree(&self, id: &Hash) -> Result<Tree> {
        Repository::load_tree(self, id)
    }
}

fn unique_match(desc: &str, matches: Vec<Hash>) -> Result<Hash> {
    match matches.as_slice() {
        [] => Err(Error::snapshot_not_found(desc)),
        [id] => Ok(*id),
        _ => Err(Error::AmbiguousSnapshot {
            desc: desc.to_string(),
            matches: matches.len(),
        }),
    }
}

/// Compress data using zstd.
fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3) // Level 3 = fast compression
        .map_err(|e| Error::compression(format!("zstd compression failed: {}", e)))
}

/// Decompress data using zstd.
fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data)
        .map_err(|e| Error::compression(format!("zstd decompression failed: {}", e)))
}
