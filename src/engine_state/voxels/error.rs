//! Error types for chunk persistence, generation and meshing.
//!
//! All of these are recoverable: the caller logs them and either regenerates the
//! chunk or drops the task so it can be resubmitted later.

use std::io;

use cgmath::Point3;
use thiserror::Error;

/// A persisted chunk could not be read back.
///
/// Any of these means the record is treated as absent and the chunk is regenerated.
#[derive(Debug, Error)]
pub enum ChunkLoadError {
    /// A node starts with an unknown tag.
    #[error("invalid node tag {tag} at byte {offset}")]
    InvalidTag {
        /// The tag found.
        tag: u8,
        /// Byte offset of the node.
        offset: usize,
    },

    /// The buffer ends inside a node.
    #[error("buffer truncated at byte {offset}: needed {needed} more bytes")]
    Truncated {
        /// Byte offset of the node.
        offset: usize,
        /// Bytes missing.
        needed: usize,
    },

    /// A valid node at a depth where its kind cannot appear.
    #[error("node with tag {tag} is not allowed at depth {depth} (byte {offset})")]
    MisplacedNode {
        /// The node's tag.
        tag: u8,
        /// Depth of the node.
        depth: u32,
        /// Byte offset of the node.
        offset: usize,
    },

    /// A splitter's child offset does not point at the end of the previous child.
    #[error("splitter at byte {splitter} stores offset {stored} for child {child}, expected {expected}")]
    BadOffset {
        /// Byte offset of the splitter.
        splitter: usize,
        /// Index of the child, 1 to 7.
        child: usize,
        /// Offset found in the header.
        stored: usize,
        /// Offset implied by the preceding children.
        expected: usize,
    },

    /// Bytes remain after the root node.
    #[error("{0} trailing bytes after the root node")]
    TrailingBytes(usize),

    /// The record belongs to another chunk.
    #[error("record header names chunk {found:?} but chunk {expected:?} was requested")]
    HeaderMismatch {
        /// Chunk that was loaded.
        expected: Point3<i32>,
        /// Chunk named by the record.
        found: Point3<i32>,
    },

    /// The record could not be read.
    #[error("chunk record I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// The terrain generator could not produce a chunk.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generator returned a grid of the wrong size.
    #[error("generator produced {found} materials, expected {expected}")]
    WrongSize {
        /// Voxels in a chunk.
        expected: usize,
        /// Voxels produced.
        found: usize,
    },

    /// Chunks at this level of detail cannot be generated.
    #[error("unsupported level of detail {0}")]
    UnsupportedLod(u8),
}

/// A structure file is malformed.
#[derive(Debug, Error)]
pub enum StructureError {
    /// Fewer bytes than the header needs.
    #[error("structure header is truncated ({0} bytes)")]
    TruncatedHeader(usize),

    /// The header's dimensions are unusable.
    #[error("structure dimensions {size_xz}x{size_y} are not positive or too large")]
    InvalidDimensions {
        /// Horizontal side length.
        size_xz: i32,
        /// Height.
        size_y: i32,
    },

    /// The payload does not match the dimensions.
    #[error("structure payload has {found} bytes, expected {expected}")]
    PayloadLength {
        /// Bytes implied by the header.
        expected: usize,
        /// Bytes present.
        found: usize,
    },

    /// The file could not be read.
    #[error("structure I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A chunk could not be meshed this time round.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The chunk itself failed to generate.
    #[error("chunk could not be generated: {0}")]
    Generation(#[from] GenerationError),

    /// A neighbour whose border layer is needed failed to generate.
    #[error("neighbour {position:?} could not be generated: {source}")]
    NeighborGeneration {
        /// The neighbour's chunk coordinate.
        position: Point3<i32>,
        /// Why it failed.
        #[source]
        source: GenerationError,
    },

    /// The chunk left the world before its mesh was built.
    #[error("chunk {0:?} is no longer resident")]
    Evicted(Point3<i32>),
}
