//! Persistence for gcipher: certificate records, revocation lists and API
//! users.
//!
//! [`storage::Storage`] is the seam the rest of the service depends on.
//! [`storage::mongodb::MongoDBStorage`] is the production backend and
//! [`storage::memory::MemoryStorage`] keeps everything in process for tests
//! and local development.

pub mod models;
pub mod storage;
