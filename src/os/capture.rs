use serde::{Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8192;

/// A capped buffer for one byte stream (stdout or stderr).
///
/// Bytes past the cap are counted and dropped. Truncation is silent: it is
/// not an error, and the producer is never blocked by a full buffer.
#[derive(Debug, Clone)]
pub struct OutputCapture {
    buffer: Vec<u8>,
    capacity: usize,
    discarded: u64,
}

impl OutputCapture {
    pub fn new(capacity: usize) -> Self {
        Self {
            // Small caps are common, large ones rarely fill up
            buffer: Vec::with_capacity(capacity.min(64 * 1024)),
            capacity,
            discarded: 0,
        }
    }

    /// Append bytes, keeping at most `capacity` bytes in total.
    ///
    /// Returns the number of bytes retained from `data`.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let available = self.capacity.saturating_sub(self.buffer.len());
        let keep = data.len().min(available);
        self.buffer.extend_from_slice(&data[..keep]);
        self.discarded += (data.len() - keep) as u64;
        keep
    }

    /// Read `reader` to EOF, retaining bytes up to the cap.
    ///
    /// The source keeps being read after the cap is hit so the writer on the
    /// other end of the pipe never stalls.
    pub async fn drain<R>(&mut self, mut reader: R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            self.append(&chunk[..n]);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether any bytes were dropped because the cap was reached
    pub fn is_truncated(&self) -> bool {
        self.discarded > 0
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Get the current contents as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current contents as a UTF-8 string (lossy conversion)
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    pub fn into_string(self) -> String {
        match String::from_utf8(self.buffer) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

impl Serialize for OutputCapture {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_string().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_within_capacity() {
        let mut capture = OutputCapture::new(16);
        assert_eq!(capture.append(b"hello\n"), 6);
        assert_eq!(capture.as_bytes(), b"hello\n");
        assert!(!capture.is_truncated());
    }

    #[test]
    fn test_append_truncates_at_cap() {
        let mut capture = OutputCapture::new(10);
        assert_eq!(capture.append(b"0\n1\n2\n3\n"), 8);
        assert_eq!(capture.append(b"4\n5\n"), 2);
        assert_eq!(capture.append(b"6\n"), 0);

        assert_eq!(capture.as_string(), "0\n1\n2\n3\n4\n");
        assert_eq!(capture.len(), capture.capacity());
        assert!(capture.is_truncated());
        assert_eq!(capture.discarded(), 4);
    }

    #[test]
    fn test_into_string_lossy() {
        let mut capture = OutputCapture::new(4);
        // Cap splits a two-byte sequence
        capture.append("abcé".as_bytes());
        assert_eq!(capture.into_string(), "abc\u{FFFD}");
    }

    #[tokio::test]
    async fn test_drain_reads_past_cap() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let producer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            // Far more than the duplex buffer, so the writer stalls unless drained
            for _ in 0..1000 {
                writer.write_all(b"0123456789").await.unwrap();
            }
        });

        let mut capture = OutputCapture::new(5);
        capture.drain(reader).await.unwrap();
        producer.await.unwrap();

        assert_eq!(capture.as_bytes(), b"01234");
        assert_eq!(capture.discarded(), 10_000 - 5);
    }

    #[test]
    fn test_serialize_as_string() {
        let mut capture = OutputCapture::new(32);
        capture.append(b"out");
        assert_eq!(serde_json::to_string(&capture).unwrap(), "\"out\"");
    }
}
