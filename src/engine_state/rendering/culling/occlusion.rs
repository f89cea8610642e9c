//! Per-chunk occlusion records and the strategies that compute them.
//!
//! An `OcclusionRecord` packs, for the 15 unordered pairs of chunk faces, whether a
//! line of sight entering through one face can leave through the other. Bit 15 is the
//! damping bit: the chunk is dense enough to count against the traversal's budget.

use std::collections::VecDeque;
use std::sync::Arc;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::block::BlockRegistry;
use crate::engine_state::voxels::chunk::{DenseGrid, CHUNK_DIMENSION, CHUNK_SIZE};

/// Face-pair visibility bits plus the damping bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OcclusionRecord(u16);

impl OcclusionRecord {
    /// Bits 0 to 14, one per face pair.
    pub const PAIR_MASK: u16 = 0x7FFF;
    /// Set when the chunk is mostly opaque.
    pub const DAMPING_BIT: u16 = 1 << 15;

    /// Every face sees every other face; not damping.
    pub const ALL_OPEN: OcclusionRecord = OcclusionRecord(Self::PAIR_MASK);
    /// No face sees any other face; not damping.
    pub const CLOSED: OcclusionRecord = OcclusionRecord(0);

    /// Wraps a raw record.
    pub fn from_bits(bits: u16) -> Self {
        OcclusionRecord(bits)
    }

    /// The raw record.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Bit index of an unordered pair of distinct faces.
    ///
    /// For `a < b` this is `a*(11-a)/2 + (b-a-1)`, which numbers the pairs 0 to 14.
    pub fn pair_bit(a: BlockSide, b: BlockSide) -> Option<u32> {
        let (a, b) = (a as u32, b as u32);
        if a == b {
            return None;
        }
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Some(a * (11 - a) / 2 + (b - a - 1))
    }

    /// Whether a ray entering through `a` can leave through `b`.
    ///
    /// A face trivially sees itself.
    pub fn is_open(self, a: BlockSide, b: BlockSide) -> bool {
        match Self::pair_bit(a, b) {
            Some(bit) => self.0 & (1 << bit) != 0,
            None => true,
        }
    }

    /// Records that `a` and `b` see each other.
    pub fn set_open(&mut self, a: BlockSide, b: BlockSide) {
        if let Some(bit) = Self::pair_bit(a, b) {
            self.0 |= 1 << bit;
        }
    }

    /// Whether a search crossing this chunk loses range.
    pub fn is_damping(self) -> bool {
        self.0 & Self::DAMPING_BIT != 0
    }

    /// Copy of the record with the damping bit set or cleared.
    pub fn with_damping(self, damping: bool) -> Self {
        if damping {
            OcclusionRecord(self.0 | Self::DAMPING_BIT)
        } else {
            OcclusionRecord(self.0 & !Self::DAMPING_BIT)
        }
    }
}

/// Computes a chunk's occlusion record from its materials.
pub trait ConnectivityStrategy: Send + Sync {
    /// Face connectivity of one chunk.
    fn compute(&self, grid: &DenseGrid, registry: &BlockRegistry) -> OcclusionRecord;
}

/// The strategies selectable from the configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityKind {
    /// Every chunk is fully transparent to the search.
    #[default]
    AlwaysOpen,
    /// Flood fill through non-opaque voxels.
    FloodFill,
}

impl ConnectivityKind {
    /// Instantiates the strategy.
    pub fn build(self) -> Arc<dyn ConnectivityStrategy> {
        match self {
            ConnectivityKind::AlwaysOpen => Arc::new(AlwaysOpen),
            ConnectivityKind::FloodFill => Arc::new(FloodFill),
        }
    }
}

/// A chunk damps visibility once at least an eighth of it is opaque.
pub fn is_damping(grid: &DenseGrid, registry: &BlockRegistry) -> bool {
    let opaque = grid
        .as_slice()
        .iter()
        .filter(|&&material| registry.is_opaque(material))
        .count();
    opaque >= CHUNK_SIZE / 8
}

/// Every face pair open. Never hides a chunk that should be drawn.
pub struct AlwaysOpen;

impl ConnectivityStrategy for AlwaysOpen {
    fn compute(&self, grid: &DenseGrid, registry: &BlockRegistry) -> OcclusionRecord {
        OcclusionRecord::ALL_OPEN.with_damping(is_damping(grid, registry))
    }
}

/// Flood fill over see-through voxels.
///
/// Every 6-connected component of non-opaque voxels opens all pairs among the chunk
/// faces it touches.
pub struct FloodFill;

impl FloodFill {
    /// Bit mask (by `BlockSide`) of the chunk faces a voxel lies on.
    fn boundary_faces(x: usize, y: usize, z: usize) -> u8 {
        let last = CHUNK_DIMENSION - 1;
        let mut faces = 0u8;
        if z == last {
            faces |= 1 << BlockSide::FRONT as u8;
        }
        if z == 0 {
            faces |= 1 << BlockSide::BACK as u8;
        }
        if y == 0 {
            faces |= 1 << BlockSide::BOTTOM as u8;
        }
        if y == last {
            faces |= 1 << BlockSide::TOP as u8;
        }
        if x == 0 {
            faces |= 1 << BlockSide::LEFT as u8;
        }
        if x == last {
            faces |= 1 << BlockSide::RIGHT as u8;
        }
        faces
    }

    /// Floods the component containing `start` and returns the faces it touches.
    fn flood(
        grid: &DenseGrid,
        registry: &BlockRegistry,
        start: (usize, usize, usize),
        visited: &mut BitVec,
        queue: &mut VecDeque<(usize, usize, usize)>,
    ) -> u8 {
        let mut faces = 0u8;
        visited.set(DenseGrid::index(start.0, start.1, start.2), true);
        queue.push_back(start);

        while let Some((x, y, z)) = queue.pop_front() {
            faces |= Self::boundary_faces(x, y, z);
            for side in BlockSide::all() {
                let normal = side.normal();
                let (nx, ny, nz) = (
                    x as i32 + normal.x,
                    y as i32 + normal.y,
                    z as i32 + normal.z,
                );
                let range = 0..CHUNK_DIMENSION as i32;
                if !range.contains(&nx) || !range.contains(&ny) || !range.contains(&nz) {
                    continue;
                }
                let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
                let index = DenseGrid::index(nx, ny, nz);
                if visited[index] || registry.is_opaque(grid.get(nx, ny, nz)) {
                    continue;
                }
                visited.set(index, true);
                queue.push_back((nx, ny, nz));
            }
        }

        faces
    }
}

impl ConnectivityStrategy for FloodFill {
    fn compute(&self, grid: &DenseGrid, registry: &BlockRegistry) -> OcclusionRecord {
        let mut record = OcclusionRecord::CLOSED;
        let mut visited = bitvec![0; CHUNK_SIZE];
        let mut queue = VecDeque::new();

        'scan: for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    if visited[DenseGrid::index(x, y, z)] || registry.is_opaque(grid.get(x, y, z)) {
                        continue;
                    }
                    let faces = Self::flood(grid, registry, (x, y, z), &mut visited, &mut queue);
                    for a in BlockSide::all() {
                        for b in BlockSide::all() {
                            if faces & (1 << a as u8) != 0 && faces & (1 << b as u8) != 0 {
                                record.set_open(a, b);
                            }
                        }
                    }
                    if record == OcclusionRecord::ALL_OPEN {
                        break 'scan;
                    }
                }
            }
        }

        record.with_damping(is_damping(grid, registry))
    }
}
