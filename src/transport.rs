//! Pluggable duplex transports.
//!
//! A [`Transport`] starts into a sending half and a stream of incoming
//! events. The stream is the Rust rendering of callback slots: an `Ok`
//! item is an incoming message, an `Err` item is a non-fatal transport
//! error (e.g. an unparseable frame), and the end of the stream is the
//! close signal.

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::io::BufReader;
use futures::stream::LocalBoxStream;
use futures::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, StreamExt as _};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

use crate::error::Error;
use crate::message::Message;

/// Incoming transport events, terminated by channel closure.
pub type MessageStream = LocalBoxStream<'static, Result<Message, Error>>;

/// A duplex message channel the protocol engine can own.
pub trait Transport: 'static {
    type Sender: TransportSender + 'static;

    /// Starts the transport, splitting it into its sending half and the
    /// incoming event stream.
    fn start(self) -> impl Future<Output = Result<(Self::Sender, MessageStream), Error>>;
}

/// The sending half of a started transport.
pub trait TransportSender {
    /// Delivers one message to the peer.
    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), Error>>;

    /// Shuts the channel down.
    fn close(&mut self) -> impl Future<Output = Result<(), Error>>;
}

/// Newline-delimited JSON over a pair of byte streams.
#[derive(Debug)]
pub struct ByteStreams<W, R> {
    outgoing: W,
    incoming: R,
}

impl<W, R> ByteStreams<W, R>
where
    W: AsyncWrite + Unpin + 'static,
    R: AsyncRead + Unpin + 'static,
{
    pub fn new(outgoing: W, incoming: R) -> Self {
        Self { outgoing, incoming }
    }
}

impl<W, R> Transport for ByteStreams<W, R>
where
    W: AsyncWrite + Unpin + 'static,
    R: AsyncRead + Unpin + 'static,
{
    type Sender = ByteStreamSender<W>;

    async fn start(self) -> Result<(Self::Sender, MessageStream), Error> {
        let incoming = BufReader::new(self.incoming)
            .lines()
            .map(|line| match line {
                Ok(line) => {
                    tracing::trace!(frame = %line, "recv");
                    serde_json::from_str(&line).map_err(|_| Error::parse_error())
                }
                Err(error) => Err(Error::into_internal_error(error)),
            })
            .boxed_local();

        let sender = ByteStreamSender {
            outgoing: self.outgoing,
        };
        Ok((sender, incoming))
    }
}

/// Sending half of [`ByteStreams`].
#[derive(Debug)]
pub struct ByteStreamSender<W> {
    outgoing: W,
}

impl<W> TransportSender for ByteStreamSender<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    async fn send(&mut self, message: Message) -> Result<(), Error> {
        let mut bytes = serde_json::to_vec(&message).map_err(Error::into_internal_error)?;
        if let Ok(frame) = std::str::from_utf8(&bytes) {
            tracing::trace!(frame = %frame, "send");
        }
        bytes.push(b'\n');
        self.outgoing
            .write_all(&bytes)
            .await
            .map_err(Error::into_internal_error)
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.outgoing
            .close()
            .await
            .map_err(Error::into_internal_error)
    }
}

/// A transport over this process's stdin/stdout, framed as newline-delimited
/// JSON.
pub fn stdio() -> ByteStreams<Compat<tokio::io::Stdout>, Compat<tokio::io::Stdin>> {
    ByteStreams::new(
        tokio::io::stdout().compat_write(),
        tokio::io::stdin().compat(),
    )
}

/// One end of an in-memory message pipe.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

/// Two connected in-memory transports. Messages sent on one end arrive on
/// the other; dropping or closing an end closes its peer's incoming stream.
pub fn pair() -> (ChannelTransport, ChannelTransport) {
    let (left_tx, right_rx) = mpsc::unbounded();
    let (right_tx, left_rx) = mpsc::unbounded();
    (
        ChannelTransport {
            tx: left_tx,
            rx: left_rx,
        },
        ChannelTransport {
            tx: right_tx,
            rx: right_rx,
        },
    )
}

impl Transport for ChannelTransport {
    type Sender = ChannelSender;

    async fn start(self) -> Result<(Self::Sender, MessageStream), Error> {
        let incoming = self.rx.map(Ok).boxed_local();
        Ok((ChannelSender { tx: self.tx }, incoming))
    }
}

/// Sending half of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelSender {
    tx: UnboundedSender<Message>,
}

impl TransportSender for ChannelSender {
    async fn send(&mut self, message: Message) -> Result<(), Error> {
        self.tx
            .unbounded_send(message)
            .map_err(|_| Error::connection_closed())
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.tx.close_channel();
        Ok(())
    }
}
