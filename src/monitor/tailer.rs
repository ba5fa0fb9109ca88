//! Per-file tail state machine.
//!
//! `Unopened -> Open -> Closed`. Closed is terminal; a file that is deleted
//! and recreated gets a fresh tailer. Opening seeks to end-of-file, so
//! content written before observation began is never delivered. A file that
//! shrinks below the offset was truncated in place and is read again from
//! the start.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::filter::FilterChain;
use crate::sender::SharedSender;
use crate::watcher::{Event, Op};

use super::error::TailError;

/// Lifecycle of a [`FileTailer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Unopened,
    Open,
    Closed,
}

/// Result of scanning a reader for complete records.
#[derive(Debug, Default)]
pub(crate) struct ScanOutcome {
    /// Bytes consumed by complete records, terminators included.
    pub consumed: u64,
    pub records: usize,
    pub error: Option<io::Error>,
}

/// Read complete `\n`-terminated records, calling `on_record` for each.
///
/// A trailing unterminated fragment is left unconsumed. On an I/O error the
/// scan stops; records already seen stay counted.
pub(crate) fn scan_records<R: BufRead>(mut reader: R, mut on_record: impl FnMut(String)) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if buf.last() != Some(&b'\n') {
                    break;
                }
                outcome.consumed += n as u64;
                outcome.records += 1;
                on_record(decode_record(&buf));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }

    outcome
}

fn decode_record(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Tails one concrete file and fans surviving lines out to senders.
pub struct FileTailer {
    path: PathBuf,
    offset: u64,
    file: Option<File>,
    state: TailState,
    filters: FilterChain,
    senders: Vec<SharedSender>,
}

impl FileTailer {
    pub fn new(path: impl Into<PathBuf>, filters: FilterChain, senders: Vec<SharedSender>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            file: None,
            state: TailState::Unopened,
            filters,
            senders,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == TailState::Closed
    }

    /// Apply one event. Returns the number of lines delivered.
    ///
    /// A failed open leaves the tailer `Unopened` so the next event retries.
    pub fn handle(&mut self, event: &Event) -> Result<usize, TailError> {
        if self.state == TailState::Closed {
            return Ok(0);
        }

        if event.op == Op::Delete {
            self.close();
            return Ok(0);
        }

        if self.state == TailState::Unopened {
            self.open()?;
        }

        self.read_new()
    }

    /// Release the file handle. Idempotent.
    pub fn close(&mut self) {
        if self.state != TailState::Closed {
            crate::debug_event!("tailer", "closed", "{} at {}", self.path.display(), self.offset);
        }
        self.file = None;
        self.state = TailState::Closed;
    }

    fn open(&mut self) -> Result<(), TailError> {
        let mut file = File::open(&self.path).map_err(|source| TailError::Open {
            path: self.path.clone(),
            source,
        })?;
        let end = file.seek(SeekFrom::End(0)).map_err(|source| TailError::Seek {
            path: self.path.clone(),
            source,
        })?;

        self.offset = end;
        self.file = Some(file);
        self.state = TailState::Open;
        crate::debug_event!("tailer", "opened", "{} at {end}", self.path.display());
        Ok(())
    }

    fn read_new(&mut self) -> Result<usize, TailError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        let len = file
            .metadata()
            .map_err(|source| TailError::Read {
                path: self.path.clone(),
                source,
            })?
            .len();
        if len < self.offset {
            // Copy-truncate rotation: the same file starts over.
            tracing::warn!(
                "[tailer] {} truncated ({len} < {}), rewinding",
                self.path.display(),
                self.offset
            );
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(0);
        }

        file.seek(SeekFrom::Start(self.offset))
            .map_err(|source| TailError::Seek {
                path: self.path.clone(),
                source,
            })?;

        let filters = &self.filters;
        let senders = &self.senders;
        let mut delivered = 0;
        let outcome = scan_records(BufReader::new(&mut *file), |record| {
            if let Some(line) = filters.apply(record) {
                for sender in senders {
                    sender.send(&line);
                }
                delivered += 1;
            }
        });
        self.offset += outcome.consumed;

        if outcome.records > 0 {
            crate::debug_event!(
                "tailer",
                "read",
                "{}: {} records, {delivered} delivered",
                self.path.display(),
                outcome.records
            );
        }

        match outcome.error {
            Some(source) => Err(TailError::Read {
                path: self.path.clone(),
                source,
            }),
            None => Ok(delivered),
        }
    }
}

impl std::fmt::Debug for FileTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTailer")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("state", &self.state)
            .finish()
    }
}
