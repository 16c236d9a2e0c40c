#![doc = r"View engine with dirty-checking change detection and hierarchical dependency injection."]

pub mod app;
pub mod collections;
pub mod component;
pub mod config;
pub mod di;
pub mod directive;
pub mod error;
pub mod platform;
pub mod render;
pub mod token;
pub mod value;
pub mod view;

pub use app::{Application, EnvironmentBuilder, ErrorHandler, LoggingErrorHandler};
pub use component::{ComponentFactory, ComponentRef};
pub use config::EngineConfig;
pub use di::{
    get_or_create_injectable, ElementInjector, Injector, ModuleInjector, NullInjector, Provider,
};
pub use directive::{
    Directive, DirectiveInstance, EventEmitter, Pipe, PipeInstance, QueryResult, SimpleChange,
    SimpleChanges,
};
pub use error::{InjectError, InjectErrorKind, ViewError, ViewResult};
pub use platform::{NoopScheduler, TickScheduler};
pub use render::{
    MemoryRenderer, MemoryRendererFactory, RNode, Renderer, RendererFactory, RendererType,
    SecurityContext, ViewEncapsulation,
};
pub use token::{Dep, InjectFlags, Token};
pub use value::Value;
pub use view::{
    create_root_view, ChangeDetectorRef, ElementRef, Environment, NodeCheck, NodeDef, NodeFlags,
    QueryList, RootContext, RootSelector, TemplateRef, ViewContainerRef, ViewDefinition, ViewRef,
};

#[cfg(test)]
#[path = "tests/test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/module_injector_tests.rs"]
mod module_injector_tests;

#[cfg(test)]
#[path = "tests/view_def_tests.rs"]
mod view_def_tests;

#[cfg(test)]
#[path = "tests/change_detection_tests.rs"]
mod change_detection_tests;

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod lifecycle_tests;

#[cfg(test)]
#[path = "tests/container_tests.rs"]
mod container_tests;

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod query_tests;

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod projection_tests;

#[cfg(test)]
#[path = "tests/node_injector_tests.rs"]
mod node_injector_tests;

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod app_tests;
