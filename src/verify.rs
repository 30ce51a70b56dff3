use md5::{Digest, Md5};
use std::io::{self, Read};

/// Reader that feeds every byte it yields into an MD5 digest, so a stream
/// can be written to disk and hashed in the same pass.
pub struct HashingReader<R> {
    reader: R,
    hasher: Md5,
    bytes: u64,
}

impl<R> HashingReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            hasher: Md5::new(),
            bytes: 0,
        }
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Lower-case hex digest of everything read.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }
}

/// Normalises an `ETag` value: surrounding quotes and a weak `W/` prefix are dropped.
pub(crate) fn normalize_etag(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.trim_matches('"').trim().to_string()
}

/// Hex digests compare case-insensitively.
pub fn checksum_matches(expected: &str, actual: &str) -> bool {
    !expected.is_empty() && expected.eq_ignore_ascii_case(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn md5_of_known_input() {
        let mut reader = HashingReader::new(Cursor::new(b"hello world".to_vec()));
        let mut sink = Vec::new();
        io::copy(&mut reader, &mut sink).unwrap();

        assert_eq!(sink, b"hello world");
        assert_eq!(reader.bytes_read(), 11);
        assert_eq!(reader.finish(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn small_buffers_hash_identically() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut whole = HashingReader::new(Cursor::new(data.clone()));
        io::copy(&mut whole, &mut io::sink()).unwrap();

        let mut chunked = HashingReader::new(Cursor::new(data));
        let mut buf = [0u8; 7];
        while chunked.read(&mut buf).unwrap() > 0 {}

        assert_eq!(whole.finish(), chunked.finish());
    }

    #[test]
    fn comparison_ignores_case_only() {
        assert!(checksum_matches("5EB63BBBE01EEED093CB22BB8F5ACDC3", "5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert!(!checksum_matches("5eb63bbbe01eeed093cb22bb8f5acdc4", "5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert!(!checksum_matches("", ""));
    }

    #[test]
    fn etag_quotes_are_stripped() {
        assert_eq!(normalize_etag("\"ABCDEF\""), "ABCDEF");
        assert_eq!(normalize_etag("W/\"abc\""), "abc");
        assert_eq!(normalize_etag(" abc "), "abc");
    }
}
