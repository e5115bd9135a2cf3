#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! Register blocks under exclusive ownership.
//!
//! A [`MappedBlock`] acquires a fixed-size byte block through the factory's
//! raw path and views it as an array of 4-byte little-endian fields:
//!
//! ```text
//! [ field 0 (4 bytes) ][ field 1 (4 bytes) ][ ... ][ field size/4 - 1 ]
//! ```
//!
//! The block is released exactly once when the value drops, through the
//! block deleter injected at acquisition. Field indices are validated
//! against the mapped size; an out-of-range access is reported, never
//! written.

use tenure_core::factory;
use tenure_core::{BlockDeleter, Owned};
use thiserror::Error;
use tracing::{debug, trace};

/// Width in bytes of one register field.
pub const FIELD_SIZE: usize = 4;

/// Errors reported by block mapping and field access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MmioError {
    /// Mapping was requested with a zero byte size.
    #[error("cannot map a zero-sized block")]
    ZeroSize,
    /// The underlying acquisition call refused the request.
    #[error("failed to acquire a {size}-byte block")]
    Acquire {
        /// Requested size in bytes.
        size: usize,
    },
    /// A field index fell outside the mapped block.
    #[error("field index {index} out of range for {fields} fields")]
    OutOfRange {
        /// Offending index.
        index: usize,
        /// Number of addressable fields in the block.
        fields: usize,
    },
}

/// A fixed-size externally-acquired block addressed as `u32` fields.
///
/// Move-only: the type implements neither `Copy` nor `Clone`, so two values
/// can never release the same block. The size is fixed at mapping time and
/// bounds every field access.
pub struct MappedBlock {
    block: Owned<u8, BlockDeleter>,
    size: usize,
}

impl MappedBlock {
    /// Acquire a zeroed block of `size` bytes.
    ///
    /// Trailing bytes beyond the last whole field stay mapped but are never
    /// addressed by [`set_field`](Self::set_field).
    pub fn map(size: usize) -> Result<Self, MmioError> {
        if size == 0 {
            return Err(MmioError::ZeroSize);
        }
        let block = factory::alloc_block(size).ok_or(MmioError::Acquire { size })?;
        debug!(size, fields = size / FIELD_SIZE, "mapped register block");
        Ok(Self { block, size })
    }

    /// Number of addressable fields.
    pub fn fields(&self) -> usize {
        self.size / FIELD_SIZE
    }

    /// Mapped size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size
    }

    /// Write `value` into field `index`.
    pub fn set_field(&mut self, index: usize, value: u32) -> Result<(), MmioError> {
        let offset = self.offset_of(index)?;
        self.bytes_mut()[offset..offset + FIELD_SIZE].copy_from_slice(&value.to_le_bytes());
        trace!(index, value, "field write");
        Ok(())
    }

    /// Read field `index`.
    pub fn field(&self, index: usize) -> Result<u32, MmioError> {
        let offset = self.offset_of(index)?;
        let bytes = &self.bytes()[offset..offset + FIELD_SIZE];
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Dump the raw contents of the block for debugging purposes.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        for (line, chunk) in self.bytes().chunks(16).enumerate() {
            let hex: String = chunk.iter().map(|b| format!("{b:02x} ")).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            out.push_str(&format!("{:04x}: {hex:<48} {ascii}\n", line * 16));
        }
        out
    }

    fn offset_of(&self, index: usize) -> Result<usize, MmioError> {
        if index >= self.fields() {
            return Err(MmioError::OutOfRange {
                index,
                fields: self.fields(),
            });
        }
        Ok(index * FIELD_SIZE)
    }

    fn bytes(&self) -> &[u8] {
        // `map` is the only constructor, so the block outlives every borrow
        // of `self` and spans exactly `size` bytes.
        unsafe { core::slice::from_raw_parts(self.block.as_ptr(), self.size) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.block.as_mut_ptr(), self.size) }
    }
}

impl Drop for MappedBlock {
    fn drop(&mut self) {
        trace!(size = self.size, "releasing register block");
    }
}

impl core::fmt::Debug for MappedBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MappedBlock")
            .field("size", &self.size)
            .field("fields", &self.fields())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_rejects_zero_size() {
        assert_eq!(MappedBlock::map(0).unwrap_err(), MmioError::ZeroSize);
    }

    #[test]
    fn mapped_block_starts_zeroed() {
        let block = MappedBlock::map(64).expect("map");
        assert_eq!(block.fields(), 16);
        for index in 0..block.fields() {
            assert_eq!(block.field(index).expect("read"), 0);
        }
    }

    #[test]
    fn overwrite_reads_back_the_last_value() {
        let mut block = MappedBlock::map(1024).expect("map");
        assert_eq!(block.fields(), 256);
        block.set_field(5, 1).expect("first write");
        assert_eq!(block.field(5).expect("read"), 1);
        block.set_field(5, 0).expect("second write");
        assert_eq!(block.field(5).expect("read"), 0);
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let mut block = MappedBlock::map(1024).expect("map");
        assert_eq!(
            block.set_field(256, 1).unwrap_err(),
            MmioError::OutOfRange { index: 256, fields: 256 }
        );
        assert_eq!(
            block.field(300).unwrap_err(),
            MmioError::OutOfRange { index: 300, fields: 256 }
        );
        // Nothing was written on the failed path.
        assert_eq!(block.field(255).expect("read"), 0);
    }

    #[test]
    fn fields_are_little_endian() {
        let mut block = MappedBlock::map(16).expect("map");
        block.set_field(0, 0x0102_0304).expect("write");
        assert_eq!(block.field(0).expect("read"), 0x0102_0304);
        assert!(block.debug_dump().starts_with("0000: 04 03 02 01"));
    }

    #[test]
    fn trailing_bytes_are_not_addressable() {
        let block = MappedBlock::map(10).expect("map");
        assert_eq!(block.fields(), 2);
        assert_eq!(block.size_bytes(), 10);
        assert_eq!(
            block.field(2).unwrap_err(),
            MmioError::OutOfRange { index: 2, fields: 2 }
        );
    }

    #[test]
    fn moving_the_block_keeps_its_contents() {
        let mut block = MappedBlock::map(64).expect("map");
        block.set_field(3, 77).expect("write");
        let mut relocated = block;
        assert_eq!(relocated.field(3).expect("read"), 77);
        relocated.set_field(3, 78).expect("write after move");
        assert_eq!(relocated.field(3).expect("read"), 78);
    }

    #[test]
    fn dropping_releases_the_mapped_bytes() {
        let block = MappedBlock::map(4096).expect("map");
        // The counter includes this mapping for as long as the block lives.
        assert!(factory::stats::outstanding_bytes() >= 4096);
        drop(block);
    }
}
