//! fakestore — storage core of an object-storage emulator.
//!
//! Buckets hold named objects with opaque content.  Request adapters talk
//! to a backend exclusively through [`Storage`]; backends keep state either
//! in memory or in a directory tree on disk, and a bootstrap loader can
//! seed either one from a mounted folder at startup.

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod object;
pub mod storage;

pub use errors::{ErrorKind, StorageError};
pub use object::Object;
pub use storage::backend::Storage;
