//! SQLite backends for the Accolade stores.
//!
//! [`SqliteDetailStore`] holds detail documents; [`SqliteReferenceStore`]
//! holds reference rows and the advisor directory. Each owns its own
//! connection (and, in production, its own database file), so no
//! transaction ever spans the two.
//!
//! Both wrap [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod detail_store;
mod directory;
mod encode;
mod reference_store;
mod schema;

pub mod error;

pub use detail_store::SqliteDetailStore;
pub use directory::{Lecturer, Student};
pub use error::{Error, Result};
pub use reference_store::SqliteReferenceStore;

#[cfg(test)]
mod tests;
