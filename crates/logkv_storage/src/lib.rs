//! # logkv storage
//!
//! Byte-store backends that sit underneath logkv segments.
//!
//! Backends are **opaque byte stores**: they never interpret the records a
//! segment writes into them. A segment owns the line format; the backend
//! only knows how to append bytes, read them back, make them durable and
//! swap its whole content atomically.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, sync, replace)
//! - No knowledge of records, keys or segment ids
//! - Must be `Send + Sync` so segments can move between threads
//! - `replace` is all-or-nothing: a reader sees the old bytes or the new ones
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral segments
//! - [`FileBackend`] - Persistent storage on top of OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use logkv_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"{\"operation\":\"delete\",\"key\":\"a\"}\n").unwrap();
//! backend.replace(b"").unwrap();
//! assert_eq!(backend.size().unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{temp_path_for, FileBackend, TEMP_SUFFIX};
pub use memory::InMemoryBackend;
