#![allow(dead_code)]

use async_trait::async_trait;
use cidfan_proxy::{PinCandidate, PinSink, Result};
use std::net::TcpListener;
use tokio::sync::mpsc;

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Forwards every registration to a channel.
pub struct ChannelSink(pub mpsc::UnboundedSender<Vec<PinCandidate>>);

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<PinCandidate>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

#[async_trait]
impl PinSink for ChannelSink {
    async fn register(&self, pins: Vec<PinCandidate>) -> Result<()> {
        let _ = self.0.send(pins);
        Ok(())
    }
}
