//! Repository traits for metadata operations.

pub mod audit;
pub mod canvases;
pub mod layers;
pub mod lock;
pub mod tiles;

pub use audit::AuditRepo;
pub use canvases::{CanvasCursor, CanvasRepo};
pub use layers::LayerRepo;
pub use lock::LockRepo;
pub use tiles::TileRepo;
