// ABOUTME: Provides the TCP transport for the broker's frame protocol
// ABOUTME: Implements buffered frame reads and atomic frame writes over a split stream

use crate::codec::CodecError;
use crate::frame::Frame;
use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Read side of a broker connection.
///
/// Exactly one `FrameReader` exists per connection. After the greeting has
/// been validated it moves into the background reader task, which from then
/// on is the only task that ever reads from the socket.
#[derive(Debug)]
pub struct FrameReader {
    stream: OwnedReadHalf,

    // The buffer for reading frames.
    buffer: BytesMut,
}

impl FrameReader {
    /// Create a new `FrameReader` backed by the read half of a socket.
    pub fn new(stream: OwnedReadHalf) -> FrameReader {
        FrameReader {
            stream,
            // A 4KB read buffer covers typical broker frames; large payload
            // objects grow it on demand.
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single `Frame` value from the underlying stream.
    ///
    /// The function waits until it has retrieved enough data to parse a
    /// frame. Any data remaining in the read buffer after the frame has been
    /// parsed is kept there for the next call to `read_frame`.
    ///
    /// # Returns
    ///
    /// On success, the received frame is returned. If the stream is closed
    /// in a way that doesn't break a frame in half, it returns `None`.
    /// Otherwise, an error is returned.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            // Attempt to parse a frame from the buffered data. If enough
            // data has been buffered, the frame is returned.
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // There is not enough buffered data to read a frame. Attempt to
            // read more data from the socket. `0` indicates "end of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The remote closed the connection. For this to be a clean
                // shutdown, there should be no data in the read buffer. If
                // there is, the peer closed the socket while sending a frame.
                return self.buffer.is_empty().then(|| None).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer")
                        .into()
                });
            }
        }
    }

    /// Tries to parse a frame from the buffer. If the buffer contains a
    /// complete frame, it is returned and its bytes removed from the buffer.
    /// If not enough data has been buffered yet, `Ok(None)` is returned. If
    /// the buffered data does not represent a valid frame, `Err` is
    /// returned.
    fn parse_frame(&mut self) -> crate::Result<Option<Frame>> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::parse(&mut buf) {
            Ok(frame) => {
                // Discard the parsed data from the read buffer.
                let len = buf.position() as usize;
                self.buffer.advance(len);
                Ok(Some(frame))
            }
            // Not enough data present in the read buffer to parse a single
            // frame. We must wait for more data to be received from the
            // socket; this is an expected runtime condition, not an error.
            Err(CodecError::Incomplete) => Ok(None),
            // The connection is now in an invalid state; there is no way to
            // find the start of the next frame mid-stream.
            Err(e) => Err(e.into()),
        }
    }
}

/// Write side of a broker connection.
///
/// A frame is encoded into a single buffer and flushed as one write, so two
/// senders can never interleave bytes as long as access is serialized by
/// the connection's write lock.
#[derive(Debug)]
pub struct FrameWriter {
    stream: BufWriter<OwnedWriteHalf>,
}

impl FrameWriter {
    /// Create a new `FrameWriter` backed by the write half of a socket.
    pub fn new(stream: OwnedWriteHalf) -> FrameWriter {
        FrameWriter {
            stream: BufWriter::new(stream),
        }
    }

    /// Write a single `Frame` value to the underlying stream, flushing it
    /// out as one contiguous byte sequence.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await
    }

    /// Shut down the write half, telling the broker we are done.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
