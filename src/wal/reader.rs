//! Sequential WAL reader
//!
//! Reads frames in order, verifying length and checksum on every frame.
//! A torn or corrupt tail is reported with the byte offset of the last
//! verifiable frame boundary so recovery can truncate there; corruption
//! is never skipped over.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::checksum::compute_checksum;
use super::errors::{WalError, WalResult};
use super::record::WalEntry;

/// Largest frame payload accepted. A length field beyond this is treated
/// as framing corruption rather than an allocation request.
const MAX_PAYLOAD_BYTES: u32 = 64 * 1024 * 1024;

/// Outcome of scanning a log that ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailReport {
    /// Byte offset of the first unverifiable frame
    pub valid_up_to: u64,
    /// Why the tail was rejected
    pub reason: String,
}

/// Reads WAL frames sequentially with verification.
pub struct WalReader {
    file: File,
    /// Offset of the next frame to read
    offset: u64,
    /// Set once the tail has been found torn or corrupt
    tail: Option<TailReport>,
}

impl WalReader {
    /// Open a WAL file for sequential reading.
    pub fn open(path: &Path) -> WalResult<Self> {
        let file = File::open(path)
            .map_err(|e| WalError::append_failed(format!("failed to open WAL: {}", path.display()), e))?;
        Ok(Self {
            file,
            offset: 0,
            tail: None,
        })
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The tail report, present after a torn or corrupt tail was found.
    pub fn tail_report(&self) -> Option<&TailReport> {
        self.tail.as_ref()
    }

    /// Read the next verified entry.
    ///
    /// Returns `Ok(None)` at a clean end of file, and also after a torn
    /// tail has been detected and recorded in the tail report. A checksum
    /// mismatch on a fully-present frame is recorded the same way: replay
    /// stops at the last verifiable boundary.
    pub fn read_next(&mut self) -> WalResult<Option<WalEntry>> {
        if self.tail.is_some() {
            return Ok(None);
        }

        let mut header = [0u8; 8];
        match read_exact_or_eof(&mut self.file, &mut header) {
            ReadOutcome::Eof => return Ok(None),
            ReadOutcome::Partial => {
                self.tail = Some(TailReport {
                    valid_up_to: self.offset,
                    reason: "torn frame header at tail".to_string(),
                });
                return Ok(None);
            }
            ReadOutcome::Err(e) => {
                return Err(WalError::append_failed("failed to read WAL header", e))
            }
            ReadOutcome::Full => {}
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if length > MAX_PAYLOAD_BYTES {
            self.tail = Some(TailReport {
                valid_up_to: self.offset,
                reason: format!("implausible frame length {}", length),
            });
            return Ok(None);
        }

        let mut payload = vec![0u8; length as usize];
        match read_exact_or_eof(&mut self.file, &mut payload) {
            ReadOutcome::Eof | ReadOutcome::Partial => {
                self.tail = Some(TailReport {
                    valid_up_to: self.offset,
                    reason: "torn frame payload at tail".to_string(),
                });
                return Ok(None);
            }
            ReadOutcome::Err(e) => {
                return Err(WalError::append_failed("failed to read WAL payload", e))
            }
            ReadOutcome::Full => {}
        }

        let actual = compute_checksum(&payload);
        if actual != expected {
            self.tail = Some(TailReport {
                valid_up_to: self.offset,
                reason: format!(
                    "checksum mismatch: expected {:08x}, computed {:08x}",
                    expected, actual
                ),
            });
            return Ok(None);
        }

        let entry = WalEntry::from_bytes(&payload).ok_or_else(|| {
            WalError::corruption_at(self.offset, "verified frame holds malformed entry")
        })?;

        self.offset += 8 + length as u64;
        Ok(Some(entry))
    }
}

enum ReadOutcome {
    Full,
    Eof,
    Partial,
    Err(io::Error),
}

/// Fill `buf` completely, distinguishing a clean EOF (zero bytes) from a
/// torn read (some bytes, then EOF).
fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> ReadOutcome {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Partial
                }
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return ReadOutcome::Err(e),
        }
    }
    ReadOutcome::Full
}
