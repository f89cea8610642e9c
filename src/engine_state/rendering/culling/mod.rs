//! Chunk visibility: per-chunk occlusion records, the view frustum and the traversal
//! that combines them into the set of chunks worth drawing.

pub mod frustum;
pub mod occlusion;
pub mod visibility;

pub use frustum::Frustum;
pub use occlusion::{ConnectivityKind, ConnectivityStrategy, OcclusionRecord};
pub use visibility::visible_set;
