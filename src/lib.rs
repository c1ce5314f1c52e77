//! An embedded, crash-consistent key-value store built on the Bitcask
//! model: an append-only log of records per data type, backed by an
//! in-memory radix-tree index mapping each live key to where its value
//! lives on disk.
//!
//! ```no_run
//! use embercask::{Bitcask, Options};
//!
//! let db = Bitcask::open(Options::new("/tmp/embercask-data"))?;
//! db.set(b"hello", b"world")?;
//! assert_eq!(db.get(b"hello")?, b"world");
//! db.close()?;
//! # Ok::<(), embercask::Error>(())
//! ```

mod error;
mod index;
mod io;
mod options;
mod record;
mod segment;
mod store;
mod strings;

pub use error::{Error, Result};
pub use options::{DataType, Options, DEFAULT_LOG_FILE_SIZE_THRESHOLD};
pub use store::Bitcask;
