//! UnixFS DAG construction.
//!
//! Files are cut into fixed-size raw leaves and, when they span more than one
//! leaf, joined by a balanced tree of dag-pb nodes. Directories are dag-pb
//! nodes whose links are sorted by name. Every node is encoded canonically so
//! the same tree always yields the same root CID.

use crate::config::EncoderConfig;
use crate::hash::{dag_pb_cid, raw_cid};
use crate::input::normalize_path;
use crate::varint::write_varint;
use crate::{Error, Result};
use bytes::Bytes;
use cid::Cid;
use std::collections::BTreeMap;

const WIRE_VARINT: u64 = 0;
const WIRE_LEN: u64 = 2;

/// UnixFS `Data.Type` values used here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DataType {
    Directory = 1,
    File = 2,
}

/// An encoded block ready to be written to an archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Bytes,
}

/// Summary of an encoded subtree, as seen by its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeSummary {
    pub cid: Cid,
    /// Cumulative size of every block in the subtree.
    pub tsize: u64,
    /// Size of the file content the subtree represents (0 for directories).
    pub filesize: u64,
}

/// A named link inside a dag-pb node.
#[derive(Clone, Debug)]
struct PbLink {
    cid: Cid,
    name: String,
    tsize: u64,
}

fn write_key(buf: &mut Vec<u8>, field: u64, wire: u64) {
    write_varint(buf, (field << 3) | wire);
}

fn write_len_field(buf: &mut Vec<u8>, field: u64, value: &[u8]) {
    write_key(buf, field, WIRE_LEN);
    write_varint(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

fn write_uint_field(buf: &mut Vec<u8>, field: u64, value: u64) {
    write_key(buf, field, WIRE_VARINT);
    write_varint(buf, value);
}

/// Encode the UnixFS `Data` message.
fn unixfs_data(kind: DataType, filesize: Option<u64>, blocksizes: &[u64]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_uint_field(&mut buf, 1, kind as u64);
    if let Some(size) = filesize {
        write_uint_field(&mut buf, 3, size);
    }
    for size in blocksizes {
        write_uint_field(&mut buf, 4, *size);
    }
    buf
}

/// Encode a dag-pb `PBNode`: links (field 2) precede data (field 1).
fn encode_pb_node(links: &[PbLink], data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    for link in links {
        let mut inner = Vec::new();
        write_len_field(&mut inner, 1, &link.cid.to_bytes());
        write_len_field(&mut inner, 2, link.name.as_bytes());
        write_uint_field(&mut inner, 3, link.tsize);
        write_len_field(&mut buf, 2, &inner);
    }
    write_len_field(&mut buf, 1, data);
    buf
}

fn dag_pb_block(links: &[PbLink], data: &[u8]) -> Result<Block> {
    let encoded = encode_pb_node(links, data);
    Ok(Block {
        cid: dag_pb_cid(&encoded)?,
        data: Bytes::from(encoded),
    })
}

/// Encode file content, returning its blocks (leaves first, root last) and
/// the summary of its root.
pub fn encode_file(content: &Bytes, config: &EncoderConfig) -> Result<(Vec<Block>, NodeSummary)> {
    let chunk_size = config.chunk_size.max(1);
    let mut blocks = Vec::new();
    let mut level = Vec::new();

    let mut offset = 0;
    loop {
        let end = (offset + chunk_size).min(content.len());
        let chunk = content.slice(offset..end);
        let cid = raw_cid(&chunk)?;
        level.push(NodeSummary {
            cid,
            tsize: chunk.len() as u64,
            filesize: chunk.len() as u64,
        });
        blocks.push(Block { cid, data: chunk });
        offset = end;
        if offset >= content.len() {
            break;
        }
    }

    let width = config.max_links.max(2);
    while level.len() > 1 {
        let mut parents = Vec::with_capacity(level.len().div_ceil(width));
        for group in level.chunks(width) {
            let filesize: u64 = group.iter().map(|n| n.filesize).sum();
            let blocksizes: Vec<u64> = group.iter().map(|n| n.filesize).collect();
            let links: Vec<PbLink> = group
                .iter()
                .map(|n| PbLink {
                    cid: n.cid,
                    name: String::new(),
                    tsize: n.tsize,
                })
                .collect();
            let block = dag_pb_block(&links, &unixfs_data(DataType::File, Some(filesize), &blocksizes))?;
            parents.push(NodeSummary {
                cid: block.cid,
                tsize: block.data.len() as u64 + group.iter().map(|n| n.tsize).sum::<u64>(),
                filesize,
            });
            blocks.push(block);
        }
        level = parents;
    }

    Ok((blocks, level[0]))
}

/// Encode a directory node from already-encoded children.
pub fn encode_directory<'a, I>(children: I) -> Result<(Block, NodeSummary)>
where
    I: IntoIterator<Item = (&'a str, NodeSummary)>,
{
    let mut links: Vec<PbLink> = children
        .into_iter()
        .map(|(name, node)| PbLink {
            cid: node.cid,
            name: name.to_string(),
            tsize: node.tsize,
        })
        .collect();
    links.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

    let block = dag_pb_block(&links, &unixfs_data(DataType::Directory, None, &[]))?;
    let summary = NodeSummary {
        cid: block.cid,
        tsize: block.data.len() as u64 + links.iter().map(|l| l.tsize).sum::<u64>(),
        filesize: 0,
    };
    Ok((block, summary))
}

enum TreeNode {
    File(NodeSummary),
    Dir(BTreeMap<String, TreeNode>),
}

/// Incrementally builds a directory tree from `(path, content)` entries.
///
/// File blocks are returned as each entry is added; directory blocks are only
/// produced by [`DirectoryBuilder::finish`], since a directory's CID depends on
/// every entry beneath it.
pub struct DirectoryBuilder {
    config: EncoderConfig,
    root: BTreeMap<String, TreeNode>,
    files: usize,
}

impl DirectoryBuilder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            root: BTreeMap::new(),
            files: 0,
        }
    }

    /// Number of files added so far.
    pub fn len(&self) -> usize {
        self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files == 0
    }

    /// Encode one file and place it in the tree at `path`.
    pub fn add_file(&mut self, path: &str, content: &Bytes) -> Result<Vec<Block>> {
        let path = normalize_path(path)?;
        let segments: Vec<&str> = path.split('/').collect();
        let (file_name, parents) = segments
            .split_last()
            .ok_or_else(|| Error::InvalidPath(path.clone()))?;

        let mut dir = &mut self.root;
        for segment in parents {
            let node = dir
                .entry(segment.to_string())
                .or_insert_with(|| TreeNode::Dir(BTreeMap::new()));
            dir = match node {
                TreeNode::Dir(children) => children,
                TreeNode::File(_) => {
                    return Err(Error::InvalidPath(format!(
                        "{path}: parent {segment} is a file"
                    )));
                }
            };
        }

        if let Some(existing) = dir.get(*file_name) {
            return Err(Error::InvalidPath(match existing {
                TreeNode::File(_) => format!("duplicate path: {path}"),
                TreeNode::Dir(_) => format!("{path}: already a directory"),
            }));
        }

        let (blocks, summary) = encode_file(content, &self.config)?;
        dir.insert(file_name.to_string(), TreeNode::File(summary));
        self.files += 1;
        Ok(blocks)
    }

    /// Encode every directory, deepest first, and return them with the root CID.
    pub fn finish(self) -> Result<(Vec<Block>, Cid)> {
        if self.files == 0 {
            return Err(Error::NoFiles("directory has no entries".to_string()));
        }
        let mut blocks = Vec::new();
        let root = encode_tree(&self.root, &mut blocks)?;
        Ok((blocks, root.cid))
    }
}

fn encode_tree(dir: &BTreeMap<String, TreeNode>, blocks: &mut Vec<Block>) -> Result<NodeSummary> {
    let mut children = Vec::with_capacity(dir.len());
    for (name, node) in dir {
        let summary = match node {
            TreeNode::File(summary) => *summary,
            TreeNode::Dir(sub) => encode_tree(sub, blocks)?,
        };
        children.push((name.as_str(), summary));
    }
    let (block, summary) = encode_directory(children)?;
    blocks.push(block);
    Ok(summary)
}
