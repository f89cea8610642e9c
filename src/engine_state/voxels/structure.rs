//! Reader for structure files.
//!
//! A structure file is two big-endian `i32`s, `size_xz` and `size_y`, followed by
//! `size_xz * size_xz * size_y` material bytes in `(x * size_xz + z) * size_y + y`
//! order. Structures are read here; placing them in the world is up to the caller.

use std::fs;
use std::path::Path;

use super::block::BlockTypeSize;
use super::error::StructureError;

const HEADER_LEN: usize = 8;

/// A parsed structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureFile {
    /// Width of the square footprint along X and Z.
    pub size_xz: usize,
    /// Height along Y.
    pub size_y: usize,
    materials: Vec<BlockTypeSize>,
}

impl StructureFile {
    /// Reads and parses a structure file.
    pub fn load(path: &Path) -> Result<Self, StructureError> {
        Self::parse(&fs::read(path)?)
    }

    /// Parses and validates the header and payload length.
    pub fn parse(bytes: &[u8]) -> Result<Self, StructureError> {
        if bytes.len() < HEADER_LEN {
            return Err(StructureError::TruncatedHeader(bytes.len()));
        }
        let read_i32 = |at: usize| i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let (size_xz, size_y) = (read_i32(0), read_i32(4));
        if size_xz <= 0 || size_y <= 0 {
            return Err(StructureError::InvalidDimensions { size_xz, size_y });
        }

        let dimensions_error = StructureError::InvalidDimensions { size_xz, size_y };
        let (size_xz, size_y) = (size_xz as usize, size_y as usize);
        let expected = size_xz
            .checked_mul(size_xz)
            .and_then(|footprint| footprint.checked_mul(size_y))
            .ok_or(dimensions_error)?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(StructureError::PayloadLength {
                expected,
                found: payload.len(),
            });
        }

        Ok(StructureFile {
            size_xz,
            size_y,
            materials: payload.to_vec(),
        })
    }

    /// Material at structure-local coordinates, or `None` outside the structure.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<BlockTypeSize> {
        if x >= self.size_xz || z >= self.size_xz || y >= self.size_y {
            return None;
        }
        Some(self.materials[(x * self.size_xz + z) * self.size_y + y])
    }
}
