//! Pin candidate extraction from a live `add` response.
//!
//! The response is NDJSON, one object per added entry. Chunks are passed
//! through untouched while complete lines are parsed on the side. Lines are
//! split on the raw `\n` byte, which never occurs inside a multi-byte UTF-8
//! sequence, so chunk boundaries may fall anywhere.

use bytes::{Bytes, BytesMut};
use cidfan_core::add_response::AddEntry;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

use crate::pin_client::PinSink;

/// An entry of the response that should be pinned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCandidate {
    pub cid: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<AddEntry> for PinCandidate {
    fn from(entry: AddEntry) -> Self {
        Self {
            cid: entry.hash.unwrap_or_default(),
            size: entry.size.unwrap_or(0),
            name: Some(entry.name).filter(|n| !n.is_empty()),
        }
    }
}

/// Incremental line parser. Feed chunks, then [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct LineParser {
    buffer: BytesMut,
    entries: Vec<AddEntry>,
    malformed: usize,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every line completed by `chunk`, keeping the partial tail.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        if let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') {
            let complete = self.buffer.split_to(last_newline + 1);
            for line in complete[..].split(|b| *b == b'\n') {
                self.parse_line(line);
            }
        }
    }

    /// Parse any trailing partial line and return the hashed entries seen.
    pub fn finish(mut self) -> Vec<AddEntry> {
        let rest = self.buffer.split();
        self.parse_line(&rest);
        if self.malformed > 0 {
            debug!(malformed = self.malformed, "skipped malformed add response lines");
        }
        self.entries
    }

    fn parse_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }
        match serde_json::from_slice::<AddEntry>(line) {
            Ok(entry) if entry.is_pin_candidate() => self.entries.push(entry),
            Ok(_) => {}
            Err(err) => {
                self.malformed += 1;
                warn!(line_len = line.len(), error = %err, "skipping malformed add response line");
            }
        }
    }
}

/// Choose the entries to pin from a complete response.
///
/// A single entry is pinned as is. A directory-wrapped add pins the last
/// entry, which is the wrapping directory. Otherwise every root-level entry
/// is pinned and nested ones are left to their parents.
pub fn select_pin_candidates(entries: Vec<AddEntry>, wrap_with_directory: bool) -> Vec<PinCandidate> {
    if entries.len() <= 1 {
        return entries.into_iter().map(PinCandidate::from).collect();
    }
    if wrap_with_directory {
        return entries.into_iter().last().map(PinCandidate::from).into_iter().collect();
    }
    entries
        .into_iter()
        .filter(|e| !e.name.contains('/'))
        .map(PinCandidate::from)
        .collect()
}

/// Read the `wrap-with-directory` flag from a proxied `add` URL.
pub fn wrap_with_directory_from_url(url: &reqwest::Url) -> bool {
    url.query_pairs()
        .find(|(k, _)| k == "wrap-with-directory")
        .is_some_and(|(_, v)| v.is_empty() || v.eq_ignore_ascii_case("true") || v == "1")
}

/// Run the parser over already-collected chunks.
pub fn extract_pin_candidates<I, B>(chunks: I, wrap_with_directory: bool) -> Vec<PinCandidate>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut parser = LineParser::new();
    for chunk in chunks {
        parser.feed(chunk.as_ref());
    }
    select_pin_candidates(parser.finish(), wrap_with_directory)
}

/// Pass-through stream that reports pin candidates once the body ends.
///
/// Every chunk is yielded as soon as the inner stream produces it. When the
/// inner stream ends, candidates go to the sink on a detached task; an
/// inner error ends extraction without reporting anything.
pub struct PinExtractor<S> {
    inner: S,
    parser: Option<LineParser>,
    wrap_with_directory: bool,
    sink: Option<Arc<dyn PinSink>>,
    candidates: Option<Vec<PinCandidate>>,
}

impl<S> PinExtractor<S> {
    pub fn new(inner: S, wrap_with_directory: bool) -> Self {
        Self {
            inner,
            parser: Some(LineParser::new()),
            wrap_with_directory,
            sink: None,
            candidates: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PinSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Candidates selected after the inner stream finished cleanly.
    pub fn candidates(&self) -> Option<&[PinCandidate]> {
        self.candidates.as_deref()
    }

    fn complete(&mut self) {
        let Some(parser) = self.parser.take() else {
            return;
        };
        let candidates = select_pin_candidates(parser.finish(), self.wrap_with_directory);
        debug!(count = candidates.len(), "pin candidates extracted");

        if let Some(sink) = self.sink.clone()
            && !candidates.is_empty()
        {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let pins = candidates.clone();
                    handle.spawn(async move {
                        if let Err(err) = sink.register(pins).await {
                            warn!(error = %err, "pin registration failed");
                        }
                    });
                }
                Err(_) => warn!("no async runtime, pin registration skipped"),
            }
        }
        self.candidates = Some(candidates);
    }
}

impl<S, E> Stream for PinExtractor<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(parser) = this.parser.as_mut() {
                    parser.feed(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.parser = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
