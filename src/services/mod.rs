// Service exports
pub mod address;
pub mod cache;
pub mod inference;
pub mod postgres;
pub mod repository;
pub mod storage;

pub use address::{AddressError, AddressResolver};
pub use cache::{CacheError, CacheStore, Fingerprint, MemoryStore, PredictionCache, RedisStore, TieredStore};
pub use inference::{InferenceClient, InferenceError};
pub use postgres::{ConnectionManager, DbError, FetchMode};
pub use repository::{PropertyRepository, RepositoryError, RowSource};
pub use storage::{ObjectStore, S3Store, StorageError};
