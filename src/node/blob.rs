//! Blobs: byte sequences of any length spread over consecutive sup slots.
//!
//! Chunk `k` lives at `start + k` and holds `MAX_SPEC_SIZE` bytes, except
//! the last one which is shorter (possibly empty). A reader stops at the
//! first short chunk or at an absent slot.

use crate::address::{NodeIndex, MAX_SPEC_SIZE};
use crate::error::Result;
use crate::store::{BackingStore, WriteBatch};

use super::{keys, Node, Tag};

impl<'s, S: BackingStore + ?Sized> Node<'s, S> {
    /// Store `data` as a blob at `start`, replacing the blob stored there.
    /// `false` (nothing written) when the chunks would run past the last
    /// index.
    pub fn set_blob(&self, data: &[u8], start: NodeIndex, tag: Tag) -> Result<bool> {
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            let mut chunks: Vec<&[u8]> = data.chunks(MAX_SPEC_SIZE).collect();
            // A full last chunk would make the reader continue past it.
            if data.len() % MAX_SPEC_SIZE == 0 {
                chunks.push(&[]);
            }
            chunks
        };
        let Some(last) = start.checked_add((chunks.len() - 1) as NodeIndex) else {
            return Ok(false);
        };

        let mut batch = WriteBatch::new();
        for (index, _) in self.blob_chunks(start, tag)? {
            if index > last {
                batch.delete(keys::slot_key(self.id, tag, index));
            }
        }
        for (k, chunk) in chunks.into_iter().enumerate() {
            batch.put(keys::slot_key(self.id, tag, start + k as NodeIndex), chunk);
        }
        self.store.write(batch)?;
        Ok(true)
    }

    /// Blob stored at `start`
    pub fn blob(&self, start: NodeIndex, tag: Tag) -> Result<Option<Vec<u8>>> {
        let chunks = self.blob_chunks(start, tag)?;
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunks.into_iter().flat_map(|(_, chunk)| chunk).collect()))
    }

    /// Size in bytes of the blob at `start`; 0 when absent
    pub fn blob_size(&self, start: NodeIndex, tag: Tag) -> Result<usize> {
        Ok(self
            .blob_chunks(start, tag)?
            .iter()
            .map(|(_, chunk)| chunk.len())
            .sum())
    }

    /// Delete the blob at `start`, returning the number of slots removed
    pub fn delete_blob(&self, start: NodeIndex, tag: Tag) -> Result<usize> {
        let chunks = self.blob_chunks(start, tag)?;
        let mut batch = WriteBatch::new();
        for (index, _) in &chunks {
            batch.delete(keys::slot_key(self.id, tag, *index));
        }
        self.store.write(batch)?;
        Ok(chunks.len())
    }

    fn blob_chunks(&self, start: NodeIndex, tag: Tag) -> Result<Vec<(NodeIndex, Vec<u8>)>> {
        let mut chunks = Vec::new();
        let mut index = start;
        while let Some(chunk) = self.sup(index, tag)? {
            let full = chunk.len() == MAX_SPEC_SIZE;
            chunks.push((index, chunk));
            if !full {
                break;
            }
            match index.checked_add(1) {
                Some(next) => index = next,
                None => break,
            }
        }
        Ok(chunks)
    }
}
