//! Tree encoding and directory nodes.

use crate::error::{Error, Result};
use crate::hash::Hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A regular file; its data is the node's content blocks.
    File,
    /// A directory; its entries live in the node's subtree.
    Dir,
    /// A symbolic link.
    Symlink,
    /// Anything else (devices, fifos, sockets).
    Other,
}

impl NodeType {
    /// Get the string name of this node type.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Dir => "dir",
            NodeType::Symlink => "symlink",
            NodeType::Other => "other",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File mode (POSIX permissions and type bits).
pub type FileMode = u32;

/// Common file modes.
pub mod file_modes {
    use super::FileMode;

    /// Regular file (non-executable).
    pub const REGULAR: FileMode = 0o100644;

    /// Executable file.
    pub const EXECUTABLE: FileMode = 0o100755;

    /// Directory.
    pub const DIRECTORY: FileMode = 0o040755;

    /// Symbolic link.
    pub const SYMLINK: FileMode = 0o120777;
}

/// Everything recorded about an entry besides its name, type and data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub mode: FileMode,
    pub uid: u32,
    pub gid: u32,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub group: String,
    pub mtime: DateTime<Utc>,
    pub atime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub inode: u64,
    #[serde(default)]
    pub links: u64,
    #[serde(default)]
    pub device: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link_target: String,
}

impl Metadata {
    /// Field-by-field comparison of two metadata records.
    pub fn equals(&self, other: &Metadata) -> bool {
        self.mode == other.mode
            && self.uid == other.uid
            && self.gid == other.gid
            && self.user == other.user
            && self.group == other.group
            && self.mtime == other.mtime
            && self.atime == other.atime
            && self.ctime == other.ctime
            && self.size == other.size
            && self.inode == other.inode
            && self.links == other.links
            && self.device == other.device
            && self.link_target == other.link_target
    }
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Entry name, unique within its tree.
    pub name: String,
    /// Entry type.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Content block hashes, in file order. Only meaningful for files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Hash>,
    /// Hash of the directory's tree. Only meaningful for directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree: Option<Hash>,
    /// Mode, ownership and timestamps.
    pub metadata: Metadata,
}

impl Node {
    /// Create a new node, validating its name.
    pub fn new(
        name: impl Into<String>,
        node_type: NodeType,
        content: Vec<Hash>,
        subtree: Option<Hash>,
        metadata: Metadata,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            node_type,
            content,
            subtree,
            metadata,
        })
    }

    /// Create a file node from its content blocks.
    pub fn file(name: impl Into<String>, content: Vec<Hash>, metadata: Metadata) -> Result<Self> {
        Self::new(name, NodeType::File, content, None, metadata)
    }

    /// Create a directory node pointing at `subtree`.
    pub fn dir(name: impl Into<String>, subtree: Hash, metadata: Metadata) -> Result<Self> {
        Self::new(name, NodeType::Dir, Vec::new(), Some(subtree), metadata)
    }

    /// Create a symlink node. The target is recorded in the metadata.
    pub fn symlink(
        name: impl Into<String>,
        target: impl Into<String>,
        mut metadata: Metadata,
    ) -> Result<Self> {
        metadata.link_target = target.into();
        Self::new(name, NodeType::Symlink, Vec::new(), None, metadata)
    }

    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Dir
    }

    /// Whether this node is a regular file.
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    /// Full structural equality: name, type, content, subtree and metadata.
    pub fn equals(&self, other: &Node) -> bool {
        self.name == other.name
            && self.node_type == other.node_type
            && content_equal(&self.content, &other.content)
            && self.subtree == other.subtree
            && self.metadata.equals(&other.metadata)
    }
}

/// Element-wise comparison of two content block sequences.
pub fn content_equal(a: &[Hash], b: &[Hash]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_node("Name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_node(format!("Reserved name: {}", name)));
    }
    if name.contains('/') {
        return Err(Error::invalid_node(format!(
            "Name cannot contain a path separator: {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::invalid_node("Name cannot contain null bytes"));
    }
    Ok(())
}

/// One directory level: nodes sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Build a tree from nodes in any order.
    ///
    /// Nodes are sorted bytewise by name; duplicate names are rejected.
    pub fn new(mut nodes: Vec<Node>) -> Result<Self> {
        nodes.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        if let Some(pair) = nodes.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(Error::invalid_node(format!(
                "Duplicate name in tree: {}",
                pair[0].name
            )));
        }

        Ok(Self { nodes })
    }

    /// Look up a node by name.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes
            .binary_search_by(|n| n.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical payload: JSON of the sorted nodes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a payload, re-validating names and ordering.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let raw: Tree = serde_json::from_slice(data)?;
        for node in &raw.nodes {
            validate_name(&node.name)?;
        }
        Self::new(raw.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta(mode: FileMode) -> Metadata {
        Metadata {
            mode,
            uid: 1000,
            gid: 1000,
            user: "alice".to_string(),
            group: "staff".to_string(),
            mtime: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            ..Metadata::default()
        }
    }

    #[test]
    fn test_node_name_validation() {
        let hash = Hash::hash_bytes(b"test");

        assert!(Node::file("", vec![hash], meta(file_modes::REGULAR)).is_err());
        assert!(Node::file("a/b", vec![hash], meta(file_modes::REGULAR)).is_err());
        assert!(Node::file("..", vec![hash], meta(file_modes::REGULAR)).is_err());
        assert!(Node::file("a\0b", vec![hash], meta(file_modes::REGULAR)).is_err());
        assert!(Node::file("ok.txt", vec![hash], meta(file_modes::REGULAR)).is_ok());
    }

    #[test]
    fn test_node_equals_fieldwise() {
        let hash = Hash::hash_bytes(b"one");
        let a = Node::file("f", vec![hash], meta(file_modes::REGULAR)).unwrap();

        let same = a.clone();
        assert!(a.equals(&same));

        let mut other_mode = a.clone();
        other_mode.metadata.mode = file_modes::EXECUTABLE;
        assert!(!a.equals(&other_mode));

        let mut other_content = a.clone();
        other_content.content = vec![Hash::hash_bytes(b"two")];
        assert!(!a.equals(&other_content));

        let mut other_type = a.clone();
        other_type.node_type = NodeType::Other;
        assert!(!a.equals(&other_type));

        let mut other_target = a.clone();
        other_target.metadata.link_target = "elsewhere".to_string();
        assert!(!a.equals(&other_target));
    }

    #[test]
    fn test_content_equal() {
        let h1 = Hash::hash_bytes(b"1");
        let h2 = Hash::hash_bytes(b"2");

        assert!(content_equal(&[], &[]));
        assert!(content_equal(&[h1, h2], &[h1, h2]));
        assert!(!content_equal(&[h1, h2], &[h2, h1]));
        assert!(!content_equal(&[h1], &[h1, h2]));
    }

    #[test]
    fn test_tree_sorted_and_unique() {
        let hash = Hash::hash_bytes(b"x");
        let tree = Tree::new(vec![
            Node::file("b.txt", vec![hash], meta(file_modes::REGULAR)).unwrap(),
            Node::file("B.txt", vec![hash], meta(file_modes::REGULAR)).unwrap(),
            Node::dir("a", hash, meta(file_modes::DIRECTORY)).unwrap(),
        ])
        .unwrap();

        let names: Vec<&str> = tree.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["B.txt", "a", "b.txt"]);
        assert!(tree.find("a").is_some_and(|n| n.is_dir()));
        assert!(tree.find("c").is_none());

        let dup = Tree::new(vec![
            Node::file("x", vec![], meta(file_modes::REGULAR)).unwrap(),
            Node::dir("x", hash, meta(file_modes::DIRECTORY)).unwrap(),
        ]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_tree_encode_decode() {
        let hash = Hash::hash_bytes(b"x");
        let tree = Tree::new(vec![
            Node::file("f", vec![hash], meta(file_modes::REGULAR)).unwrap(),
            Node::symlink("l", "f", meta(file_modes::SYMLINK)).unwrap(),
        ])
        .unwrap();

        let decoded = Tree::decode(&tree.encode().unwrap()).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.nodes[1].metadata.link_target, "f");
    }

    #[test]
    fn test_tree_decode_rejects_bad_names() {
        // Encode a valid tree, then smuggle a separator into the name
        let tree = Tree::new(vec![Node::file("ab", vec![], Metadata::default()).unwrap()]).unwrap();
        let json = String::from_utf8(tree.encode().unwrap())
            .unwrap()
            .replace("\"ab\"", "\"a/b\"");
        assert!(Tree::decode(json.as_bytes()).is_err());
        assert!(Tree::decode(b"not json").is_err());
    }

    #[test]
    fn test_empty_tree() {
        let tree = Tree::default();
        let decoded = Tree::decode(&tree.encode().unwrap()).unwrap();
        assert!(decoded.is_empty());
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Tree hash is independent of the order nodes were supplied in
        #[test]
        fn prop_tree_canonical_encoding(
            names in prop::collection::btree_set("[a-zA-Z0-9._-]{1,20}", 1..20)
        ) {
            let names: Vec<String> = names
                .into_iter()
                .filter(|n| n != "." && n != "..")
                .collect();
            let nodes: Vec<Node> = names
                .iter()
                .map(|n| {
                    Node::file(
                        n.clone(),
                        vec![Hash::hash_bytes(n.as_bytes())],
                        Metadata::default(),
                    )
                    .unwrap()
                })
                .collect();

            let mut reversed = nodes.clone();
            reversed.reverse();

            let a = Tree::new(nodes)?.encode()?;
            let b = Tree::new(reversed)?.encode()?;
            prop_assert_eq!(Hash::hash_bytes(&a), Hash::hash_bytes(&b));
        }
    }
}
