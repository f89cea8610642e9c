//! # World Module
//!
//! This module provides the `WorldGrid`, the fixed-capacity table of resident chunks.
//!
//! ## Architecture
//!
//! The grid is a toroidal array of `W × H × W` slots. A chunk at position `(x, y, z)`
//! lives in slot `(x mod W, y mod H, z mod W)`, so a cube of chunks centered on the
//! viewer always fits without two chunks competing for a slot. When the viewer moves,
//! the slots that fall out of the cube are reused by the chunks coming into it.
//!
//! Because positions wrap, a slot may still hold the chunk from the other side of the
//! torus. Every lookup therefore checks the resident chunk's real position; a mismatch
//! is reported as `SlotLookup::Stale` and the caller must evict before reusing the slot.
//!
//! ## Thread Safety
//!
//! The grid is owned by the engine and shared with workers as an `MtResource`. Only the
//! engine thread installs and evicts chunks; workers take the read lock just long
//! enough to clone the `Arc<Chunk>`s they need.

use std::sync::Arc;

use cgmath::Point3;

use crate::engine_state::voxels::chunk::Chunk;

/// Result of looking a chunk position up in the grid.
#[derive(Debug)]
pub enum SlotLookup {
    /// Nothing lives in the slot.
    Vacant,
    /// The slot holds the requested chunk.
    Resident(Arc<Chunk>),
    /// The slot holds a different chunk that wrapped onto the same slot.
    Stale(Arc<Chunk>),
}

/// Fixed-size slot table keyed by wrapped chunk coordinate.
#[derive(Debug)]
pub struct WorldGrid {
    width: usize,
    height: usize,
    lod: u8,
    slots: Vec<Option<Arc<Chunk>>>,
}

impl WorldGrid {
    /// Creates an empty grid big enough for a cube of the given radii around the viewer.
    ///
    /// # Arguments
    /// * `horizontal_radius` - Chunks kept on each side of the viewer along X and Z
    /// * `vertical_radius` - Chunks kept above and below the viewer
    /// * `lod` - Level of detail of every chunk in this grid
    pub fn new(horizontal_radius: u32, vertical_radius: u32, lod: u8) -> Self {
        let width = 2 * horizontal_radius as usize + 1;
        let height = 2 * vertical_radius as usize + 1;
        WorldGrid {
            width,
            height,
            lod,
            slots: vec![None; width * width * height],
        }
    }

    /// Slots along x and z.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Slots along y.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Level of detail of every chunk in the grid.
    pub fn lod(&self) -> u8 {
        self.lod
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The slot a chunk position maps to.
    pub fn slot_index(&self, position: Point3<i32>) -> usize {
        let x = position.x.rem_euclid(self.width as i32) as usize;
        let y = position.y.rem_euclid(self.height as i32) as usize;
        let z = position.z.rem_euclid(self.width as i32) as usize;
        x + self.width * (y + self.height * z)
    }

    /// Looks up the slot of `position` and checks the identity of its occupant.
    pub fn lookup(&self, position: Point3<i32>) -> SlotLookup {
        match &self.slots[self.slot_index(position)] {
            None => SlotLookup::Vacant,
            Some(chunk) if chunk.position == position && chunk.lod == self.lod => {
                SlotLookup::Resident(Arc::clone(chunk))
            }
            Some(chunk) => SlotLookup::Stale(Arc::clone(chunk)),
        }
    }

    /// The chunk at `position`, if it is the one resident in its slot.
    pub fn get(&self, position: Point3<i32>) -> Option<Arc<Chunk>> {
        match self.lookup(position) {
            SlotLookup::Resident(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Puts a chunk into its slot.
    ///
    /// # Returns
    /// The previous occupant of the slot, if any. The caller is responsible for flushing
    /// it if it is dirty.
    pub fn install(&mut self, chunk: Arc<Chunk>) -> Option<Arc<Chunk>> {
        debug_assert_eq!(chunk.lod, self.lod);
        let index = self.slot_index(chunk.position);
        self.slots[index].replace(chunk)
    }

    /// Removes the chunk at `position` if it is the resident one.
    pub fn evict(&mut self, position: Point3<i32>) -> Option<Arc<Chunk>> {
        let index = self.slot_index(position);
        match &self.slots[index] {
            Some(chunk) if chunk.position == position => self.slots[index].take(),
            _ => None,
        }
    }

    /// Removes every chunk, returning them.
    pub fn clear(&mut self) -> Vec<Arc<Chunk>> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// All resident chunks.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(x: i32, y: i32, z: i32) -> Arc<Chunk> {
        Arc::new(Chunk::new(Point3::new(x, y, z), 0))
    }

    #[test]
    fn a_viewer_cube_never_collides() {
        let grid = WorldGrid::new(2, 1, 0);
        let mut seen = vec![false; grid.capacity()];
        for z in -7..-2 {
            for y in 4..7 {
                for x in 10..15 {
                    let slot = grid.slot_index(Point3::new(x, y, z));
                    assert!(!seen[slot], "slot {slot} used twice");
                    seen[slot] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn wrapped_positions_are_reported_stale() {
        let mut grid = WorldGrid::new(1, 1, 0);
        assert!(grid.install(chunk(0, 0, 0)).is_none());

        assert!(matches!(grid.lookup(Point3::new(0, 0, 0)), SlotLookup::Resident(_)));
        match grid.lookup(Point3::new(3, 0, -3)) {
            SlotLookup::Stale(occupant) => assert_eq!(occupant.position, Point3::new(0, 0, 0)),
            other => panic!("expected a stale slot, got {other:?}"),
        }
        assert!(grid.get(Point3::new(3, 0, -3)).is_none());
        assert!(matches!(grid.lookup(Point3::new(1, 0, 0)), SlotLookup::Vacant));
    }

    #[test]
    fn installing_over_a_stale_slot_returns_the_old_occupant() {
        let mut grid = WorldGrid::new(1, 1, 0);
        grid.install(chunk(-1, 0, 0));
        let evicted = grid.install(chunk(2, 0, 0)).expect("previous occupant");
        assert_eq!(evicted.position, Point3::new(-1, 0, 0));
        assert!(grid.get(Point3::new(2, 0, 0)).is_some());

        assert!(grid.evict(Point3::new(-1, 0, 0)).is_none());
        assert!(grid.evict(Point3::new(2, 0, 0)).is_some());
        assert_eq!(grid.iter().count(), 0);
    }
}
