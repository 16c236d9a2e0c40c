//! Dependency injection: module injectors, provider records and the
//! bloom-filtered element injector walk.

mod bloom;
mod injector;
pub(crate) mod node_injector;
mod provider;

pub use bloom::{BloomFilter, NodeBloom};
pub use injector::{Injector, ModuleInjector, NullInjector};
pub use node_injector::{get_or_create_injectable, ElementInjector};
pub use provider::{FactoryFn, Provider, ProviderKind};
