//! Line codec for socket framing
//!
//! Both protocol versions are framed the same way: one record per
//! `\n`-terminated line. A trailing `\r` is stripped.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default maximum line size (1 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line too long (max {max} bytes)")]
    LineTooLong { max: usize },
}

/// One framed request record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Legacy text command
    V1(String),
    /// JSON request envelope
    V2(String),
    /// A line that exceeded the size limit and was discarded
    Oversized { json: bool },
}

impl Record {
    /// Classify a complete line by its first non-whitespace byte
    pub fn classify(line: String) -> Self {
        if looks_like_json(line.as_bytes()) {
            Record::V2(line)
        } else {
            Record::V1(line)
        }
    }

    /// Whether a reply to this record must be JSON
    pub fn is_json(&self) -> bool {
        match self {
            Record::V1(_) => false,
            Record::V2(_) => true,
            Record::Oversized { json } => *json,
        }
    }
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

/// Scan state shared by both codecs
#[derive(Debug)]
struct LineScanner {
    max_line_bytes: usize,
    /// Bytes already searched for a newline
    next_index: usize,
    /// Set while skipping the rest of an oversized line
    discarding: Option<bool>,
}

enum Scan {
    Line(String),
    Oversized { json: bool },
    Incomplete,
}

impl LineScanner {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            next_index: 0,
            discarding: None,
        }
    }

    fn scan(&mut self, src: &mut BytesMut) -> Scan {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            if let Some(json) = self.discarding {
                match newline {
                    Some(end) => {
                        let _ = src.split_to(end + 1);
                        self.next_index = 0;
                        self.discarding = None;
                        return Scan::Oversized { json };
                    }
                    None => {
                        let _ = src.split_to(src.len());
                        self.next_index = 0;
                        return Scan::Incomplete;
                    }
                }
            }

            match newline {
                Some(end) if end > self.max_line_bytes => {
                    self.discarding = Some(looks_like_json(&src[..end]));
                    continue;
                }
                Some(end) => {
                    let line = src.split_to(end + 1);
                    self.next_index = 0;
                    let mut line = &line[..end];
                    if line.last() == Some(&b'\r') {
                        line = &line[..line.len() - 1];
                    }
                    return Scan::Line(String::from_utf8_lossy(line).into_owned());
                }
                None if src.len() > self.max_line_bytes => {
                    self.discarding = Some(looks_like_json(src));
                    continue;
                }
                None => {
                    self.next_index = src.len();
                    return Scan::Incomplete;
                }
            }
        }
    }
}

fn encode_line(item: &str, dst: &mut BytesMut) {
    dst.reserve(item.len() + 1);
    dst.put_slice(item.as_bytes());
    if !item.ends_with('\n') {
        dst.put_u8(b'\n');
    }
}

/// Server side codec: decodes classified records, encodes reply text
#[derive(Debug)]
pub struct RecordCodec {
    scanner: LineScanner,
}

impl RecordCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            scanner: LineScanner::new(max_line_bytes),
        }
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.scanner.scan(src) {
                Scan::Line(line) if line.trim().is_empty() => continue,
                Scan::Line(line) => return Ok(Some(Record::classify(line))),
                Scan::Oversized { json } => return Ok(Some(Record::Oversized { json })),
                Scan::Incomplete => return Ok(None),
            }
        }
    }
}

impl Encoder<String> for RecordCodec {
    type Error = CodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(&item, dst);
        Ok(())
    }
}

/// Client side codec: plain lines in both directions
#[derive(Debug)]
pub struct LineCodec {
    scanner: LineScanner,
}

impl LineCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            scanner: LineScanner::new(max_line_bytes),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.scanner.scan(src) {
            Scan::Line(line) => Ok(Some(line)),
            Scan::Oversized { .. } => Err(CodecError::LineTooLong {
                max: self.scanner.max_line_bytes,
            }),
            Scan::Incomplete => Ok(None),
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Record::classify("ping".into()), Record::V1("ping".into()));
        assert_eq!(
            Record::classify("  {\"id\":1}".into()),
            Record::V2("  {\"id\":1}".into())
        );
        assert!(!Record::classify("set_status k -- {x}".into()).is_json());
    }

    #[test]
    fn test_partial_reads_are_buffered() {
        let mut codec = RecordCodec::default();
        let mut buf = BytesMut::from("pi");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ng\r\nlist_work");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Record::V1("ping".into())));
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"spaces\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Record::V1("list_workspaces".into()))
        );
    }

    #[test]
    fn test_multiple_records_in_one_read() {
        let mut codec = RecordCodec::default();
        let mut buf = BytesMut::from("ping\n{\"id\":1,\"method\":\"system.ping\"}\n\nping\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Record::V1("ping".into())));
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(Record::V2(_))));
        // Blank lines are skipped
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Record::V1("ping".into())));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let mut codec = RecordCodec::new(8);
        let mut buf = BytesMut::from("{\"id\":12345");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"6789}\nping\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Record::Oversized { json: true })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Record::V1("ping".into())));
    }

    #[test]
    fn test_line_codec_rejects_oversized() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from("too long\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::LineTooLong { max: 4 })
        ));
    }

    #[test]
    fn test_encode_appends_newline_once() {
        let mut codec = RecordCodec::default();
        let mut buf = BytesMut::new();
        codec.encode("OK".to_string(), &mut buf).unwrap();
        codec.encode("PONG\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"OK\nPONG\n");
    }
}
