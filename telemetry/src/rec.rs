use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    time::Duration,
};

use anyhow::Context;

use crate::{cluon, messages::Envelope, TelemetryState};

/// Reads the envelopes of a recorded OD4 session (`.rec` file) in order.
/// Iteration stops after the first error.
pub struct RecFileReader<R> {
    reader: R,
    entries: u64,
    failed: bool,
}

impl RecFileReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening recording {}", path.display()))?;

        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RecFileReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, entries: 0, failed: false }
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }
}

impl<R: Read> Iterator for RecFileReader<R> {
    type Item = anyhow::Result<Envelope>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match cluon::read_envelope(&mut self.reader) {
            Ok(Some(envelope)) => {
                self.entries += 1;
                Some(Ok(envelope))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e.context(format!("reading entry {} of recording", self.entries + 1))))
            }
        }
    }
}

/// Plays a recording back into a `TelemetryState`, paced by the caller.
/// Time is measured from the first timestamped envelope; envelopes without a
/// timestamp are applied as soon as they are reached.
pub struct Replay<R> {
    reader: RecFileReader<R>,
    pending: Option<Envelope>,
    origin: Option<i64>,
}

impl Replay<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(RecFileReader::open(path)?))
    }
}

impl<R: Read> Replay<R> {
    pub fn new(reader: RecFileReader<R>) -> Self {
        Self { reader, pending: None, origin: None }
    }

    /// Applies every reading recorded up to `elapsed` into the run and
    /// returns how many were applied.
    pub fn advance(&mut self, elapsed: Duration, state: &TelemetryState) -> anyhow::Result<usize> {
        let elapsed = elapsed.as_micros() as i64;
        let mut applied = 0;
        loop {
            let envelope = match self.pending.take() {
                Some(envelope) => envelope,
                None => match self.reader.next() {
                    Some(envelope) => envelope?,
                    None => return Ok(applied),
                },
            };

            if let Some(t) = envelope.timestamp_micros() {
                let origin = *self.origin.get_or_insert(t);
                if t - origin > elapsed {
                    self.pending = Some(envelope);
                    return Ok(applied);
                }
            }

            match envelope.reading() {
                Ok(Some(reading)) => {
                    state.apply(reading);
                    applied += 1;
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping recorded envelope: {e}"),
            }
        }
    }
}
