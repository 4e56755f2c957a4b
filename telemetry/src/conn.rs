use std::{
    io::{Read, Write},
    net::TcpStream,
    time::Duration,
};

use anyhow::{anyhow, bail};
use prost::Message as _;
use serde::{Deserialize, Serialize};

use crate::{cluon, messages::Envelope};

/// Envelopes larger than this are treated as a corrupt stream.
const MAX_MESSAGE_SIZE: u64 = 1 << 20;

/// How envelopes are delimited on a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Encoded size as a little-endian u64 before every envelope.
    #[default]
    LengthPrefixed,
    /// OD4 containers: `0x0D 0xA4` followed by a 24 bit little-endian size.
    Cluon,
}

pub struct FramedConn<S> {
    stream: S,
    framing: Framing,
}

impl FramedConn<TcpStream> {
    pub fn connect(addr: &str, framing: Framing) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(6)))?;
        stream.set_nodelay(true)?;

        Ok(Self::with_framing(stream, framing))
    }
}

impl<S: Read + Write> FramedConn<S> {
    pub fn new(stream: S) -> Self {
        Self::with_framing(stream, Framing::default())
    }

    pub fn with_framing(stream: S, framing: Framing) -> Self {
        Self { stream, framing }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn send_envelope(&mut self, envelope: &Envelope) -> anyhow::Result<()> {
        match self.framing {
            Framing::LengthPrefixed => {
                let encoded = envelope.encode_to_vec();
                let size_bytes = (encoded.len() as u64).to_le_bytes();
                self.stream.write_all(&size_bytes)?;
                self.stream.write_all(&encoded)?;
            }
            Framing::Cluon => cluon::write_envelope(&mut self.stream, envelope)?,
        }
        self.stream.flush()?;

        Ok(())
    }

    pub fn receive_envelope(&mut self) -> anyhow::Result<Envelope> {
        if self.framing == Framing::Cluon {
            return cluon::read_envelope(&mut self.stream)?.ok_or_else(|| anyhow!("Stream closed"));
        }

        let mut size_bytes = [0u8; 8];
        self.stream.read_exact(&mut size_bytes)?;
        let size = u64::from_le_bytes(size_bytes);
        if size > MAX_MESSAGE_SIZE {
            bail!("Envelope of {size} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit");
        }

        let mut buf = vec![0u8; size as usize];
        self.stream.read_exact(&mut buf)?;

        Ok(Envelope::decode(buf.as_slice())?)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
