//! Persisted chunk records.
//!
//! A record is three big-endian `i32` chunk coordinates followed by the disc
//! linearization of the chunk's octree. `ChunkStorage` keeps one record per file,
//! grouped by level of detail.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use cgmath::Point3;
use log::debug;

use crate::engine_state::voxels::error::ChunkLoadError;
use crate::engine_state::voxels::octree;

/// Size of the coordinate header.
pub const RECORD_HEADER_LEN: usize = 12;

/// One chunk as it is stored on disc.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Chunk coordinate.
    pub position: Point3<i32>,
    /// The octree in disc linearization.
    pub octree: Vec<u8>,
}

impl ChunkRecord {
    /// Writes the big-endian position header followed by the octree.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&self.position.x.to_be_bytes())?;
        writer.write_all(&self.position.y.to_be_bytes())?;
        writer.write_all(&self.position.z.to_be_bytes())?;
        writer.write_all(&self.octree)?;
        Ok(())
    }

    /// Reads a whole record. The octree bytes are not validated here.
    pub fn read_from(reader: &mut impl Read) -> Result<Self, ChunkLoadError> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        reader.read_exact(&mut header).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => ChunkLoadError::Truncated {
                offset: 0,
                needed: RECORD_HEADER_LEN,
            },
            _ => ChunkLoadError::Io(err),
        })?;

        let coordinate = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&header[4 * i..4 * i + 4]);
            i32::from_be_bytes(bytes)
        };
        let position = Point3::new(coordinate(0), coordinate(1), coordinate(2));

        let mut octree = Vec::new();
        reader.read_to_end(&mut octree)?;
        Ok(ChunkRecord { position, octree })
    }

    /// Validates the octree and converts it to the in-memory layout.
    ///
    /// # Returns
    /// `ChunkLoadError::HeaderMismatch` if the record belongs to another chunk,
    /// otherwise whatever `octree::from_disc` reports.
    pub fn into_buffer(self, expected: Point3<i32>) -> Result<Vec<u8>, ChunkLoadError> {
        if self.position != expected {
            return Err(ChunkLoadError::HeaderMismatch {
                expected,
                found: self.position,
            });
        }
        octree::from_disc(&self.octree)
    }
}

/// A directory of chunk records, one file per chunk: `<root>/lod<L>/<x>_<y>_<z>.chunk`.
#[derive(Clone, Debug)]
pub struct ChunkStorage {
    root: PathBuf,
}

impl ChunkStorage {
    /// Storage rooted at a save directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ChunkStorage { root: root.into() }
    }

    /// The save directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a chunk.
    pub fn path_for(&self, position: Point3<i32>, lod: u8) -> PathBuf {
        self.root
            .join(format!("lod{lod}"))
            .join(format!("{}_{}_{}.chunk", position.x, position.y, position.z))
    }

    /// Loads a chunk's in-memory octree.
    ///
    /// # Returns
    /// * `Ok(None)` if the chunk was never stored
    /// * `Ok(Some(buffer))` with a validated buffer
    /// * `Err(_)` if the record exists but is unreadable or corrupt
    pub fn load(&self, position: Point3<i32>, lod: u8) -> Result<Option<Vec<u8>>, ChunkLoadError> {
        let path = self.path_for(position, lod);
        let mut file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record = ChunkRecord::read_from(&mut io::BufReader::new(&mut file))?;
        let buffer = record.into_buffer(position)?;
        debug!("Read chunk {:?} (lod {}) from {}", position, lod, path.display());
        Ok(Some(buffer))
    }

    /// Writes a chunk record, replacing any previous one.
    pub fn save(&self, position: Point3<i32>, lod: u8, disc_octree: Vec<u8>) -> io::Result<()> {
        let path = self.path_for(position, lod);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = ChunkRecord {
            position,
            octree: disc_octree,
        };
        let mut writer = io::BufWriter::new(fs::File::create(&path)?);
        record.write_to(&mut writer)?;
        writer.flush()?;
        debug!("Wrote chunk {:?} (lod {}) to {}", position, lod, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::chunk_creation::DenseGrid;

    const STONE: u8 = BlockType::STONE as u8;

    fn temp_storage(name: &str) -> ChunkStorage {
        let root = std::env::temp_dir().join(format!("voxel-octree-engine-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        ChunkStorage::new(root)
    }

    fn sample_octree() -> Vec<u8> {
        let mut grid = DenseGrid::new();
        grid.fill_cube(0, 0, 0, 4, STONE);
        grid.set(5, 6, 7, STONE);
        octree::compress(&grid)
    }

    #[test]
    fn record_header_is_big_endian() {
        let record = ChunkRecord {
            position: Point3::new(1, -2, 258),
            octree: vec![0, STONE],
        };
        let mut bytes = Vec::new();
        record.write_to(&mut bytes).expect("write to vec");
        assert_eq!(&bytes[..12], &[0, 0, 0, 1, 255, 255, 255, 254, 0, 0, 1, 2]);
        assert_eq!(ChunkRecord::read_from(&mut bytes.as_slice()).expect("read back"), record);
    }

    #[test]
    fn stored_chunks_load_back_and_missing_chunks_are_absent() {
        let storage = temp_storage("round-trip");
        let position = Point3::new(3, -1, 4);
        let buffer = sample_octree();

        assert!(storage.load(position, 0).expect("missing is not an error").is_none());
        storage.save(position, 0, octree::to_disc(&buffer)).expect("save");
        assert_eq!(storage.load(position, 0).expect("load"), Some(buffer));
        assert!(storage.load(position, 1).expect("other lod").is_none());

        let _ = fs::remove_dir_all(storage.root());
    }

    #[test]
    fn records_for_a_different_chunk_are_corrupt() {
        let storage = temp_storage("mismatch");
        let position = Point3::new(0, 0, 0);
        storage.save(position, 0, octree::to_disc(&sample_octree())).expect("save");

        let path = storage.path_for(position, 0);
        let moved = storage.path_for(Point3::new(1, 0, 0), 0);
        fs::rename(&path, &moved).expect("rename");

        assert!(matches!(
            storage.load(Point3::new(1, 0, 0), 0),
            Err(ChunkLoadError::HeaderMismatch { .. })
        ));
        let _ = fs::remove_dir_all(storage.root());
    }

    #[test]
    fn truncated_files_are_corrupt() {
        let storage = temp_storage("truncated");
        let position = Point3::new(2, 2, 2);
        let path = storage.path_for(position, 0);
        fs::create_dir_all(path.parent().expect("lod directory")).expect("mkdir");

        fs::write(&path, [0u8, 0, 0]).expect("write");
        assert!(matches!(storage.load(position, 0), Err(ChunkLoadError::Truncated { .. })));

        let mut bytes = Vec::new();
        ChunkRecord { position, octree: octree::to_disc(&sample_octree()) }
            .write_to(&mut bytes)
            .expect("encode");
        bytes.truncate(bytes.len() - 5);
        fs::write(&path, &bytes).expect("write");
        assert!(storage.load(position, 0).is_err());

        let _ = fs::remove_dir_all(storage.root());
    }
}
