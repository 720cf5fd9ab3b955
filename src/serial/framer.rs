//! # Line Framer
//!
//! Splits the rover's telemetry byte stream into newline-terminated lines.
//!
//! Bytes accumulate in a [`BytesMut`] filled by `read_buf`, which is
//! cancel-safe: if a read is abandoned by a timeout, whatever arrived stays
//! buffered and is completed by the next call.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

/// Longest line accepted before the buffer is discarded
pub const MAX_LINE_LEN: usize = 1024;

/// Frames an async byte stream into text lines.
#[derive(Debug)]
pub struct LineFramer<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Read the next line.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(line))` - a complete line, trimmed, invalid UTF-8 replaced
    /// * `Ok(None)` - the stream reached EOF with nothing buffered
    ///
    /// At EOF a trailing unterminated fragment is returned as a final line.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                if pos > MAX_LINE_LEN {
                    warn!("Discarding {}-byte serial line", pos);
                    continue;
                }
                return Ok(Some(decode_line(&line)));
            }

            if self.buf.len() > MAX_LINE_LEN {
                warn!("Discarding {} bytes of unterminated serial input", self.buf.len());
                self.buf.advance(self.buf.len());
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = self.buf.split();
                return Ok(Some(decode_line(&rest)));
            }
        }
    }
}

/// Decode permissively: invalid UTF-8 never fails, it is replaced.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_splits_lines() {
        let mock = tokio_test::io::Builder::new()
            .read(b"L: 10cm\r\nC: 20")
            .read(b"cm\n")
            .build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(framer.next_line().await.unwrap().as_deref(), Some("L: 10cm"));
        assert_eq!(framer.next_line().await.unwrap().as_deref(), Some("C: 20cm"));
        assert_eq!(framer.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mock = tokio_test::io::Builder::new()
            .read(b"R: 5cm \xff\xfe\n")
            .build();
        let mut framer = LineFramer::new(mock);

        let line = framer.next_line().await.unwrap().unwrap();
        assert!(line.starts_with("R: 5cm"));
        assert!(line.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_trailing_fragment_returned_at_eof() {
        let mock = tokio_test::io::Builder::new().read(b"partial").build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(framer.next_line().await.unwrap().as_deref(), Some("partial"));
        assert_eq!(framer.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_line_survives_timeout() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut framer = LineFramer::new(host);

        device.write_all(b"C: 4").await.unwrap();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            framer.next_line(),
        )
        .await;
        assert!(timed_out.is_err(), "no newline yet, read should time out");

        device.write_all(b"2cm\n").await.unwrap();
        assert_eq!(framer.next_line().await.unwrap().as_deref(), Some("C: 42cm"));
    }

    #[tokio::test]
    async fn test_overlong_line_discarded() {
        let mut junk = vec![b'x'; MAX_LINE_LEN + 10];
        junk.extend_from_slice(b"\nL: 1cm\n");
        let (mut device, host) = tokio::io::duplex(4096);
        device.write_all(&junk).await.unwrap();
        drop(device);

        let mut framer = LineFramer::new(host);
        let mut lines = Vec::new();
        while let Some(line) = framer.next_line().await.unwrap() {
            lines.push(line);
        }

        assert_eq!(lines.last().map(String::as_str), Some("L: 1cm"));
        assert!(lines.iter().all(|l| l.len() <= MAX_LINE_LEN));
    }
}
