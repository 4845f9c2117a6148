use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{timeout, Duration};

use crate::config::MAX_MESSAGE_SIZE;
use crate::protocol::{decode, encode, Message};
use crate::transport::{Inbound, Outbound, Transport};

/// Newline-delimited JSON over a TCP stream.
pub struct TcpTransport {
    reader: TcpReader,
    writer: TcpWriter,
    peer: String,
}

/// Receiving half of a [`TcpTransport`].
pub struct TcpReader {
    reader: BufReader<OwnedReadHalf>,
    /// Bytes of a line not yet terminated, kept across cancelled reads.
    partial: Vec<u8>,
    timeout_duration: Option<Duration>,
    max_message_size: usize,
}

/// Sending half of a [`TcpTransport`].
pub struct TcpWriter {
    writer: OwnedWriteHalf,
    timeout_duration: Option<Duration>,
    max_message_size: usize,
}

impl TcpTransport {
    /// Wrap `stream` with no receive timeout and the default size limit.
    pub fn new(stream: TcpStream) -> Self {
        Self::with_config(stream, None, MAX_MESSAGE_SIZE)
    }

    pub fn with_timeout(stream: TcpStream, timeout_duration: Duration) -> Self {
        Self::with_config(stream, Some(timeout_duration), MAX_MESSAGE_SIZE)
    }

    pub fn with_config(
        stream: TcpStream,
        timeout_duration: Option<Duration>,
        max_message_size: usize,
    ) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: TcpReader {
                reader: BufReader::new(read_half),
                partial: Vec::new(),
                timeout_duration,
                max_message_size,
            },
            writer: TcpWriter {
                writer: write_half,
                timeout_duration,
                max_message_size,
            },
            peer,
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

fn read_error(e: std::io::Error) -> anyhow::Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => anyhow::anyhow!("Connection closed by peer"),
        std::io::ErrorKind::ConnectionReset => anyhow::anyhow!("Connection reset by peer"),
        std::io::ErrorKind::InvalidData => anyhow::anyhow!("Message is not valid UTF-8"),
        _ => anyhow::anyhow!("Read error: {}", e),
    }
}

fn write_error(e: std::io::Error) -> anyhow::Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe
        || e.kind() == std::io::ErrorKind::ConnectionReset
    {
        anyhow::anyhow!("Connection closed by peer")
    } else {
        anyhow::anyhow!("Write error: {}", e)
    }
}

impl TcpReader {
    /// `read_until` appends to `partial` as it goes, which keeps this
    /// future cancel safe.
    async fn read_message(&mut self) -> anyhow::Result<Message> {
        let limit = self.max_message_size + 1;
        loop {
            let room = limit.saturating_sub(self.partial.len()) as u64;
            let n = (&mut self.reader)
                .take(room)
                .read_until(b'\n', &mut self.partial)
                .await
                .map_err(read_error)?;
            if self.partial.last() != Some(&b'\n') {
                if self.partial.len() >= limit {
                    self.partial.clear();
                    return Err(anyhow::anyhow!(
                        "Message too large: more than {} bytes",
                        self.max_message_size
                    ));
                }
                if n == 0 {
                    return Err(anyhow::anyhow!("Connection closed by peer"));
                }
                continue;
            }
            let bytes = std::mem::take(&mut self.partial);
            let line = String::from_utf8(bytes)
                .map_err(|_| anyhow::anyhow!("Message is not valid UTF-8"))?;
            if line.trim().is_empty() {
                continue;
            }
            return decode(&line);
        }
    }
}

#[async_trait::async_trait]
impl Inbound for TcpReader {
    async fn recv(&mut self) -> anyhow::Result<Message> {
        match self.timeout_duration {
            Some(d) => timeout(d, self.read_message())
                .await
                .map_err(|_| anyhow::anyhow!("Receive timeout after {:?}", d))?,
            None => self.read_message().await,
        }
    }
}

impl TcpWriter {
    async fn write_message(&mut self, msg: &Message) -> anyhow::Result<()> {
        let mut data = encode(msg)?;
        if data.len() > self.max_message_size {
            return Err(anyhow::anyhow!(
                "Message too large: {} bytes (max: {})",
                data.len(),
                self.max_message_size
            ));
        }
        data.push('\n');
        self.writer
            .write_all(data.as_bytes())
            .await
            .map_err(write_error)?;
        self.writer.flush().await.map_err(write_error)
    }
}

#[async_trait::async_trait]
impl Outbound for TcpWriter {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        match self.timeout_duration {
            Some(d) => timeout(d, self.write_message(msg))
                .await
                .map_err(|_| anyhow::anyhow!("Send timeout after {:?}", d))?,
            None => self.write_message(msg).await,
        }
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await.map_err(write_error)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        self.writer.send(msg).await
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        self.reader.recv().await
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self: Box<Self>) -> (Box<dyn Inbound>, Box<dyn Outbound>) {
        (Box::new(self.reader), Box::new(self.writer))
    }
}
