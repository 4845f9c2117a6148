use tokio::sync::mpsc;

use crate::protocol::{decode, encode, Message};
use crate::transport::{Inbound, Outbound, Transport};

/// One end of an in-process connection. Messages go through the JSON codec
/// so both ends see exactly what a socket peer would.
pub struct InMemoryTransport {
    inbound: InMemoryInbound,
    outbound: InMemoryOutbound,
    label: String,
}

pub struct InMemoryInbound {
    rx: mpsc::UnboundedReceiver<String>,
}

pub struct InMemoryOutbound {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl InMemoryTransport {
    pub fn pair() -> (Self, Self) {
        Self::pair_labelled("memory-a", "memory-b")
    }

    pub fn pair_labelled(a: &str, b: &str) -> (Self, Self) {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        (
            Self {
                inbound: InMemoryInbound { rx: rx1 },
                outbound: InMemoryOutbound { tx: Some(tx2) },
                label: b.to_string(),
            },
            Self {
                inbound: InMemoryInbound { rx: rx2 },
                outbound: InMemoryOutbound { tx: Some(tx1) },
                label: a.to_string(),
            },
        )
    }

    /// Push an already encoded line to the peer, bypassing the encoder.
    pub fn send_raw(&mut self, line: impl Into<String>) -> anyhow::Result<()> {
        self.outbound.push(line.into())
    }
}

impl InMemoryOutbound {
    fn push(&self, line: String) -> anyhow::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Transport is shut down"))?;
        tx.send(line)
            .map_err(|_| anyhow::anyhow!("Connection closed by peer"))
    }
}

#[async_trait::async_trait]
impl Inbound for InMemoryInbound {
    async fn recv(&mut self) -> anyhow::Result<Message> {
        loop {
            match self.rx.recv().await {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return decode(&line),
                None => return Err(anyhow::anyhow!("Connection closed by peer")),
            }
        }
    }
}

#[async_trait::async_trait]
impl Outbound for InMemoryOutbound {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        self.push(encode(msg)?)
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.tx = None;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        self.outbound.send(msg).await
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        self.inbound.recv().await
    }

    fn peer(&self) -> String {
        self.label.clone()
    }

    fn split(self: Box<Self>) -> (Box<dyn Inbound>, Box<dyn Outbound>) {
        (Box::new(self.inbound), Box::new(self.outbound))
    }
}
