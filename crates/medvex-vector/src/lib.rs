//! medvex-vector — Vector store clients.
//!
//! Collection/point persistence behind the [`VectorStore`] trait:
//!   - [`QdrantStore`] — the Qdrant REST API (production)
//!   - [`MemoryStore`] — in-process map (tests, dry runs)
//!
//! Both writer operations are idempotent: collection creation is
//! create-if-absent and upserts overwrite by point id, so replaying an
//! in-flight article after a crash converges to the same stored state.

pub mod error;
pub mod memory;
pub mod qdrant;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use store::{Distance, ScoredPoint, VectorStore};
