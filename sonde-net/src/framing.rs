//! Length-prefixed framing for TCP messages.
//!
//! Wire format: `[u32 length (big-endian)][UTF-8 payload]`. Payloads are the
//! already-encoded telemetry records (server to client) or command text
//! (client to server).

use std::io::{self, Read, Write};

/// Upper bound on a single frame. Anything larger is a corrupt stream.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Write one length-prefixed text frame to a stream.
pub fn write_frame<W: Write>(writer: &mut W, payload: &str) -> io::Result<()> {
    let bytes = payload.as_bytes();
    let len = bytes.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(bytes)?;
    writer.flush()?;

    Ok(())
}

/// Read one length-prefixed text frame from a stream.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", len),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    String::from_utf8(payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_text() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "hello telemetry").unwrap();

        let mut cursor = Cursor::new(buf);
        let result = read_frame(&mut cursor).unwrap();
        assert_eq!(result, "hello telemetry");
    }

    #[test]
    fn roundtrip_empty_and_unicode() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "").unwrap();
        write_frame(&mut buf, "état 状態").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), "");
        assert_eq!(read_frame(&mut cursor).unwrap(), "état 状態");
    }

    #[test]
    fn rejects_oversized_frame() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn short_read_is_an_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&8u32.to_be_bytes());
        buf.extend_from_slice(b"only4");
        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).is_err());
    }
}
