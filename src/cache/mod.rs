//! Tag-invalidated response cache.
//!
//! Listing responses are cached as serialized bytes under deterministic keys
//! (see [`keys`]). Every entry carries one or more tags; writes invalidate
//! whole tag cohorts according to [`policy`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! ```

mod config;
mod index;
pub mod keys;
pub mod policy;
mod store;

pub use config::CacheConfig;
pub use index::TagIndex;
pub use keys::{build_key, operations, tags};
pub use policy::{InvalidationTiming, WriteOperation};
pub use store::{CacheEntry, Epoch, TaggedCache};
