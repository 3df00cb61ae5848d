//! CAR v1 archive encoding.
//!
//! An archive is a varint-prefixed DAG-CBOR header naming the root, followed
//! by `varint(len) || cid || block` sections. When streaming, the root is not
//! known until the last entry has been encoded, so the header carries a
//! placeholder of identical length and [`rewrite_root`] patches it afterwards.

use crate::config::EncoderConfig;
use crate::hash::{DAG_PB_CODEC, placeholder_cid};
use crate::input::DirectoryEntry;
use crate::unixfs::{Block, DirectoryBuilder};
use crate::varint::{read_varint, write_varint};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use cid::Cid;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// Stream of archive bytes.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[derive(Debug, Serialize, Deserialize)]
struct CarHeader {
    roots: Vec<Cid>,
    version: u64,
}

/// Encode the length-prefixed archive header for `root`.
pub fn encode_header(root: &Cid) -> Result<Vec<u8>> {
    let header = CarHeader {
        roots: vec![*root],
        version: 1,
    };
    let body = serde_ipld_dagcbor::to_vec(&header).map_err(|e| Error::Archive(e.to_string()))?;
    let mut out = Vec::with_capacity(body.len() + 2);
    write_varint(&mut out, body.len() as u64);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode the archive header at the start of `archive`.
///
/// Returns the roots and the number of bytes the header occupies.
pub fn decode_header(archive: &[u8]) -> Result<(Vec<Cid>, usize)> {
    let (len, prefix) =
        read_varint(archive).ok_or_else(|| Error::Archive("truncated header length".to_string()))?;
    let end = prefix + len as usize;
    let body = archive
        .get(prefix..end)
        .ok_or_else(|| Error::Archive("truncated header".to_string()))?;
    let header: CarHeader =
        serde_ipld_dagcbor::from_slice(body).map_err(|e| Error::Archive(e.to_string()))?;
    if header.version != 1 {
        return Err(Error::Archive(format!(
            "unsupported archive version {}",
            header.version
        )));
    }
    Ok((header.roots, end))
}

/// Encode one block section.
pub fn encode_section(block: &Block) -> Bytes {
    let cid = block.cid.to_bytes();
    let mut prefix = Vec::with_capacity(10);
    write_varint(&mut prefix, (cid.len() + block.data.len()) as u64);

    let mut out = BytesMut::with_capacity(prefix.len() + cid.len() + block.data.len());
    out.extend_from_slice(&prefix);
    out.extend_from_slice(&cid);
    out.extend_from_slice(&block.data);
    out.freeze()
}

/// Replace the placeholder root in a streamed archive's header.
///
/// `archive` needs to cover at least the header. The root must encode to the
/// same length as the placeholder, which holds for every dag-pb sha2-256 CID.
pub fn rewrite_root(archive: &mut [u8], root: &Cid) -> Result<()> {
    let placeholder = placeholder_cid(DAG_PB_CODEC)?.to_bytes();
    let replacement = root.to_bytes();
    if placeholder.len() != replacement.len() {
        return Err(Error::Archive(format!(
            "root {root} does not fit the header placeholder"
        )));
    }

    let (_, header_len) = decode_header(archive)?;
    let header = &mut archive[..header_len];
    let offset = header
        .windows(placeholder.len())
        .position(|w| w == placeholder.as_slice())
        .ok_or_else(|| Error::Archive("header has no placeholder root".to_string()))?;
    header[offset..offset + replacement.len()].copy_from_slice(&replacement);
    Ok(())
}

/// Resolves to the archive's root once its stream has been fully consumed.
///
/// Fails if the stream errors or is dropped before its end.
pub struct RootCid {
    rx: oneshot::Receiver<Cid>,
}

impl Future for RootCid {
    type Output = Result<Cid>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| {
            res.map_err(|_| Error::Archive("archive stream ended before the root was known".to_string()))
        })
    }
}

/// Stream `entries` into an archive.
///
/// Blocks are written bottom-up: every file's blocks in entry order, then
/// directories deepest first, the root last. Repeated blocks are written once.
/// The header carries a placeholder root; see [`rewrite_root`].
pub fn encode_entries<S>(entries: S, config: EncoderConfig) -> (ArchiveStream, RootCid)
where
    S: Stream<Item = Result<DirectoryEntry>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    let stream = async_stream::try_stream! {
        yield Bytes::from(encode_header(&placeholder_cid(DAG_PB_CODEC)?)?);

        let mut entries = Box::pin(entries);
        let mut builder = DirectoryBuilder::new(config);
        let mut seen = HashSet::new();

        while let Some(entry) = entries.next().await {
            let entry = entry?;
            for block in builder.add_file(&entry.path, &entry.content)? {
                if seen.insert(block.cid) {
                    yield encode_section(&block);
                }
            }
        }

        let files = builder.len();
        let (blocks, root) = builder.finish()?;
        for block in blocks {
            if seen.insert(block.cid) {
                yield encode_section(&block);
            }
        }
        debug!(%root, files, blocks = seen.len(), "archive encoded");
        let _ = tx.send(root);
    };

    (Box::pin(stream), RootCid { rx })
}

/// A fully buffered archive with its header already naming the root.
#[derive(Clone, Debug)]
pub struct PackedArchive {
    pub root: Cid,
    pub bytes: Bytes,
}

/// Encode in-memory entries into a complete archive.
///
/// Hashing is CPU-bound, so the encoder runs on the blocking pool and the
/// calling task stays responsive to cancellation.
pub async fn pack(entries: Vec<DirectoryEntry>, config: EncoderConfig) -> Result<PackedArchive> {
    tokio::task::spawn_blocking(move || futures::executor::block_on(pack_entries(entries, config)))
        .await
        .map_err(|e| Error::Archive(format!("encoder task failed: {e}")))?
}

async fn pack_entries(entries: Vec<DirectoryEntry>, config: EncoderConfig) -> Result<PackedArchive> {
    let (mut stream, root) = encode_entries(futures::stream::iter(entries.into_iter().map(Ok)), config);

    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    let root = root.await?;
    rewrite_root(&mut buf, &root)?;

    Ok(PackedArchive {
        root,
        bytes: Bytes::from(buf),
    })
}

/// Iterate the sections of an archive as `(cid, data)` pairs.
pub fn read_sections(archive: &[u8]) -> Result<Vec<(Cid, Bytes)>> {
    let (_, mut offset) = decode_header(archive)?;
    let mut sections = Vec::new();
    while offset < archive.len() {
        let (len, prefix) = read_varint(&archive[offset..])
            .ok_or_else(|| Error::Archive(format!("truncated section at {offset}")))?;
        let start = offset + prefix;
        let end = start + len as usize;
        let section = archive
            .get(start..end)
            .ok_or_else(|| Error::Archive(format!("truncated section at {offset}")))?;
        let mut cursor = std::io::Cursor::new(section);
        let cid = Cid::read_bytes(&mut cursor).map_err(|e| Error::InvalidCid(e.to_string()))?;
        let data_start = cursor.position() as usize;
        sections.push((cid, Bytes::copy_from_slice(&section[data_start..])));
        offset = end;
    }
    Ok(sections)
}
