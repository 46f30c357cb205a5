//! Length-prefixed framing for stream transports.
//!
//! The envelope layer produces and consumes opaque byte payloads. Stream
//! hosts (Unix sockets, pipes) delimit them with a 4-byte big-endian length:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  codec payload   |
//! +----------------+------------------+
//! ```

use std::io::{Read, Write};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Checks a payload length against [`MAX_MESSAGE_SIZE`].
pub fn check_len(len: usize) -> ProtocolResult<u32> {
    match u32::try_from(len) {
        Ok(len) if len <= MAX_MESSAGE_SIZE => Ok(len),
        _ => Err(ProtocolError::MessageTooLarge {
            size: u32::try_from(len).unwrap_or(u32::MAX),
            max: MAX_MESSAGE_SIZE,
        }),
    }
}

/// Prefixes `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    let len = check_len(payload.len())?;
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }

    let mut buffer = Vec::with_capacity(4 + payload.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(payload);
    Ok(buffer)
}

/// Returns the payload of a complete frame.
pub fn decode_frame(data: &[u8]) -> ProtocolResult<&[u8]> {
    let Some((prefix, rest)) = data.split_first_chunk::<4>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: data.len(),
        });
    };

    let len = check_len(u32::from_be_bytes(*prefix) as usize)? as usize;
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if rest.len() < len {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: data.len(),
        });
    }

    Ok(&rest[..len])
}

/// Reads frames from a blocking byte stream.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads one payload.
    ///
    /// Returns `Ok(None)` on EOF before the length prefix.
    pub fn read_frame(&mut self) -> ProtocolResult<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = check_len(u32::from_be_bytes(len_buf) as usize)? as usize;
        if len == 0 {
            return Err(ProtocolError::EmptyMessage);
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;
        Ok(Some(payload))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes frames to a blocking byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one payload and flushes.
    pub fn write_frame(&mut self, payload: &[u8]) -> ProtocolResult<()> {
        let data = encode_frame(payload)?;
        self.writer.write_all(&data)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_roundtrip() {
        let bytes = encode_frame(br#"{"method":"add"}"#).unwrap();
        assert_eq!(&bytes[..4], &16u32.to_be_bytes());
        assert_eq!(decode_frame(&bytes).unwrap(), br#"{"method":"add"}"#);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut bytes = encode_frame(b"one").unwrap();
        bytes.extend_from_slice(b"garbage");
        assert_eq!(decode_frame(&bytes).unwrap(), b"one");
    }

    #[test]
    fn decode_incomplete_length() {
        assert!(matches!(
            decode_frame(&[0, 0]),
            Err(ProtocolError::IncompleteMessage {
                expected: 4,
                received: 2
            })
        ));
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            decode_frame(&data),
            Err(ProtocolError::IncompleteMessage {
                expected: 104,
                received: 14
            })
        ));
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let data = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        assert!(matches!(
            decode_frame(&data),
            Err(ProtocolError::MessageTooLarge { .. })
        ));

        let payload = vec![b'x'; MAX_MESSAGE_SIZE as usize + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(matches!(encode_frame(b""), Err(ProtocolError::EmptyMessage)));

        let mut reader = FrameReader::new(Cursor::new(0u32.to_be_bytes().to_vec()));
        assert!(matches!(reader.read_frame(), Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn reader_writer_stream() {
        let payloads: [&[u8]; 3] = [b"first", b"second", "трети".as_bytes()];

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for payload in payloads {
                writer.write_frame(payload).unwrap();
            }
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        for expected in payloads {
            assert_eq!(reader.read_frame().unwrap().unwrap(), expected);
        }
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn reader_reports_truncated_payload() {
        let mut data = 10u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"abc");
        let mut reader = FrameReader::new(Cursor::new(data));
        assert!(matches!(reader.read_frame(), Err(ProtocolError::Io(_))));
    }
}
