use std::io::{ErrorKind, Read, Write};

use anyhow::bail;
use prost::Message as _;

use crate::messages::Envelope;

/// First two bytes of every OD4 container.
pub const HEADER: [u8; 2] = [0x0D, 0xA4];
/// The payload length is a 24 bit little-endian field.
pub const MAX_PAYLOAD: usize = 0xFF_FFFF;

pub fn write_envelope<W: Write>(writer: &mut W, envelope: &Envelope) -> anyhow::Result<()> {
    let encoded = envelope.encode_to_vec();
    if encoded.len() > MAX_PAYLOAD {
        bail!("Envelope of {} bytes does not fit a 24 bit length", encoded.len());
    }
    let len = (encoded.len() as u32).to_le_bytes();
    writer.write_all(&[HEADER[0], HEADER[1], len[0], len[1], len[2]])?;
    writer.write_all(&encoded)?;

    Ok(())
}

/// Reads one container. Returns `None` when the stream ends cleanly before a
/// new header starts.
pub fn read_envelope<R: Read>(reader: &mut R) -> anyhow::Result<Option<Envelope>> {
    let mut header = [0u8; 5];
    if !read_first(reader, &mut header[..1])? {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..])?;
    if header[..2] != HEADER {
        bail!("Bad container header {:02x} {:02x}", header[0], header[1]);
    }

    let size = u32::from_le_bytes([header[2], header[3], header[4], 0]) as usize;
    let mut buf = vec![0u8; size];
    reader.read_exact(&mut buf)?;

    Ok(Some(Envelope::decode(buf.as_slice())?))
}

fn read_first<R: Read>(reader: &mut R, buf: &mut [u8]) -> anyhow::Result<bool> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::messages::Reading;

    #[test]
    fn container_layout_matches_od4() {
        let envelope = Envelope::distance(0.5, 0);
        let payload = envelope.encode_to_vec();

        let mut bytes = Vec::new();
        write_envelope(&mut bytes, &envelope).unwrap();

        assert_eq!(&bytes[..2], &[0x0D, 0xA4]);
        assert_eq!(bytes[2] as usize, payload.len());
        assert_eq!(&bytes[3..5], &[0, 0]);
        assert_eq!(&bytes[5..], payload.as_slice());
    }

    #[test]
    fn hand_framed_container_decodes() {
        let payload = Envelope::distance(0.5, 0).encode_to_vec();
        let mut bytes = vec![0x0D, 0xA4, payload.len() as u8, 0, 0];
        bytes.extend_from_slice(&payload);
        let mut cursor = Cursor::new(bytes);

        let envelope = read_envelope(&mut cursor).unwrap().unwrap();
        assert_eq!(envelope.reading().unwrap(), Some(Reading::Distance(0.5)));
        assert!(read_envelope(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut cursor = Cursor::new(vec![0x0D, 0xA5, 0, 0, 0]);
        assert!(read_envelope(&mut cursor).is_err());
    }

    #[test]
    fn truncated_container_is_an_error() {
        let mut cursor = Cursor::new(vec![0x0D, 0xA4, 10, 0, 0, 1, 2]);
        assert!(read_envelope(&mut cursor).is_err());
    }
}
