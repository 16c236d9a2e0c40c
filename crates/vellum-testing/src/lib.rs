//! Testing utilities and harness for Vellum

pub mod fixture;
pub mod hooks;

// Re-export testing utilities
pub use fixture::*;
pub use hooks::*;

pub mod prelude {
    pub use crate::fixture::*;
    pub use crate::hooks::*;
}
