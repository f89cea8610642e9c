use crate::engine_state::voxels::block::block_side::BlockSide;

const POSITION_BITS: u32 = 6;
const POSITION_MASK: u32 = (1 << POSITION_BITS) - 1;
const DIRECTION_BITS: u32 = 3;
const DIRECTION_MASK: u32 = (1 << DIRECTION_BITS) - 1;

/// One greedy rectangle, packed for upload.
///
/// The rectangle lies on `side` of the voxels it covers. `(x, y, z)` is the voxel with
/// the smallest in-plane coordinates; `size1` runs along the layer's `u` axis and
/// `size2` along its `v` axis (see `layer_voxel`).
///
/// # Memory Layout
/// - `word0`: `x | y << 6 | z << 12 | (size1 - 1) << 18 | (size2 - 1) << 24`
/// - `word1`: `direction | texture_index << 3`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedFace {
    /// Position and size.
    pub word0: u32,
    /// Direction and texture.
    pub word1: u32,
}

impl PackedFace {
    /// Packs a rectangle. Positions must be below 64 and sizes in `1..=64`.
    pub fn new(
        (x, y, z): (usize, usize, usize),
        size1: usize,
        size2: usize,
        side: BlockSide,
        texture_index: u16,
    ) -> Self {
        debug_assert!(x < 64 && y < 64 && z < 64);
        debug_assert!((1..=64).contains(&size1) && (1..=64).contains(&size2));
        let word0 = x as u32
            | (y as u32) << POSITION_BITS
            | (z as u32) << (2 * POSITION_BITS)
            | (size1 as u32 - 1) << (3 * POSITION_BITS)
            | (size2 as u32 - 1) << (4 * POSITION_BITS);
        let word1 = side as u32 | (texture_index as u32) << DIRECTION_BITS;
        PackedFace { word0, word1 }
    }

    fn field(&self, index: u32) -> usize {
        ((self.word0 >> (index * POSITION_BITS)) & POSITION_MASK) as usize
    }

    /// Chunk-local corner voxel.
    pub fn position(&self) -> (usize, usize, usize) {
        (self.field(0), self.field(1), self.field(2))
    }

    /// Extent along the layer's `u` axis.
    pub fn size1(&self) -> usize {
        self.field(3) + 1
    }

    /// Extent along the layer's `v` axis.
    pub fn size2(&self) -> usize {
        self.field(4) + 1
    }

    /// Face direction.
    pub fn side(&self) -> BlockSide {
        BlockSide::from_index((self.word1 & DIRECTION_MASK) as usize).unwrap_or(BlockSide::FRONT)
    }

    /// Texture layer.
    pub fn texture_index(&self) -> u32 {
        self.word1 >> DIRECTION_BITS
    }

    /// Number of unit voxel faces covered.
    pub fn area(&self) -> usize {
        self.size1() * self.size2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_survive_packing() {
        let face = PackedFace::new((31, 0, 17), 32, 1, BlockSide::LEFT, 1234);
        assert_eq!(face.position(), (31, 0, 17));
        assert_eq!(face.size1(), 32);
        assert_eq!(face.size2(), 1);
        assert_eq!(face.side(), BlockSide::LEFT);
        assert_eq!(face.texture_index(), 1234);
        assert_eq!(face.word0, 31 | 17 << 12 | 31 << 18);
        assert_eq!(bytemuck::bytes_of(&face).len(), 8);
    }
}
