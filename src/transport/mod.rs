//! Message transports.
//!
//! A [`Transport`] carries [`Message`]s over one bidirectional connection.
//! The server splits each transport into an [`Inbound`] half read by a
//! dedicated task and an [`Outbound`] half written by the match.

use crate::protocol::Message;

#[async_trait::async_trait]
pub trait Inbound: Send {
    /// Next message from the peer.
    ///
    /// Cancel safe: dropping the future before it resolves loses no input,
    /// and the next call picks up where the dropped one stopped.
    async fn recv(&mut self) -> anyhow::Result<Message>;
}

#[async_trait::async_trait]
pub trait Outbound: Send {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()>;

    /// Close the sending direction; the peer sees end of stream.
    async fn shutdown(&mut self) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<Message>;

    /// Human readable name of the remote end, used in logs.
    fn peer(&self) -> String;

    fn split(self: Box<Self>) -> (Box<dyn Inbound>, Box<dyn Outbound>);
}

pub mod in_memory;
pub mod tcp;
