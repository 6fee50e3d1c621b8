//! Session lifecycle: token → agent binding plus the cross-process marker cache

pub mod marker;
pub mod registry;

pub use marker::{InMemoryMarkerCache, MarkerCache, RedisMarkerCache};
pub use registry::{Resolved, SessionRegistry};
