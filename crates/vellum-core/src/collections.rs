//! Map aliases used across the runtime.
//!
//! Token and query lookups sit on the hot per-check path, so the default build
//! uses FxHash. The `std-hash` feature swaps in the std SipHash maps.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::hash_map::Entry;
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
    pub use std::collections::hash_map::Entry;
}
