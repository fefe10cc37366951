//! WAL Reader
//!
//! Handles reading frames from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{AreaDbError, Result};

use super::entry::HEADER_SIZE;
use super::WalEntry;

/// Frames larger than this are treated as a torn header
const MAX_FRAME_PAYLOAD: u64 = 256 * 1024 * 1024;

/// Outcome of reading one frame
#[derive(Debug)]
pub enum Frame {
    /// A complete frame with a valid checksum
    Valid(WalEntry),

    /// A complete frame whose payload failed verification; the reader has
    /// moved past it
    Corrupted { lsn: u64 },

    /// The file ends in the middle of a frame (partial write)
    Truncated,
}

/// Reads entries from the WAL file
pub struct WalReader {
    file: BufReader<File>,
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Offset just past the last frame returned
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame. `None` at a clean end of file.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(Some(Frame::Truncated));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let (lsn, crc, len) = WalEntry::parse_header(&header);

        let len = len as u64;
        if len > MAX_FRAME_PAYLOAD || remaining < HEADER_SIZE as u64 + len {
            return Ok(Some(Frame::Truncated));
        }

        let mut data = vec![0u8; len as usize];
        self.file.read_exact(&mut data)?;
        self.position += HEADER_SIZE as u64 + len;

        match WalEntry::decode_payload(lsn, crc, &data) {
            Ok(entry) => Ok(Some(Frame::Valid(entry))),
            Err(AreaDbError::WalCorruption(_)) => Ok(Some(Frame::Corrupted { lsn })),
            Err(e) => Err(e),
        }
    }

    /// Read the next entry from the WAL
    ///
    /// A corrupted frame is an error; a torn tail ends the log.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Some(Frame::Valid(entry)) => Ok(Some(entry)),
            Some(Frame::Corrupted { lsn }) => Err(AreaDbError::WalCorruption(format!(
                "Corrupted entry with LSN {} at offset {}",
                lsn, self.position
            ))),
            Some(Frame::Truncated) | None => Ok(None),
        }
    }

    /// Iterate over all entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
