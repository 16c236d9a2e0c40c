use std::cell::RefCell;
use std::rc::Rc;

use vellum_core::render::Sanitizer;
use vellum_core::{
    Application, ChangeDetectorRef, ComponentFactory, ComponentRef, EngineConfig,
    EnvironmentBuilder, ErrorHandler, Injector, MemoryRenderer, MemoryRendererFactory,
    ModuleInjector, NullInjector, Provider, RNode, Value, ViewError, ViewResult,
};
use vellum_runtime_std::StdRuntime;

/// Error handler that keeps every reported error for later assertions.
#[derive(Debug, Default)]
pub struct CollectingErrorHandler {
    errors: RefCell<Vec<ViewError>>,
}

impl CollectingErrorHandler {
    pub fn errors(&self) -> Vec<ViewError> {
        self.errors.borrow().clone()
    }

    pub fn take(&self) -> Vec<ViewError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn handle_error(&self, error: &ViewError) {
        log::debug!("collected error: {error}");
        self.errors.borrow_mut().push(error.clone());
    }
}

/// Configures the environment a [`ComponentFixture`] runs in.
pub struct FixtureBuilder {
    injector: Option<Rc<dyn Injector>>,
    providers: Vec<Provider>,
    sanitizer: Option<Rc<dyn Sanitizer>>,
    config: EngineConfig,
    projectable_nodes: Vec<Vec<RNode>>,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            injector: None,
            providers: Vec::new(),
            sanitizer: None,
            config: EngineConfig::development(),
            projectable_nodes: Vec::new(),
        }
    }

    /// Module injector consulted after the element tree.
    pub fn injector(mut self, injector: Rc<dyn Injector>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Providers registered in a fixture-level module injector whose parent
    /// is the configured injector.
    pub fn providers(mut self, providers: Vec<Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Rc<dyn Sanitizer>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Nodes rendered at the component's `ng-content` slots, one list per
    /// slot.
    pub fn project(mut self, nodes: Vec<Vec<RNode>>) -> Self {
        self.projectable_nodes = nodes;
        self
    }

    pub fn create(self, factory: &ComponentFactory) -> ViewResult<ComponentFixture> {
        let renderer_factory = MemoryRendererFactory::new();
        let renderer = renderer_factory.renderer();
        let errors = Rc::new(CollectingErrorHandler::default());
        let mut builder = EnvironmentBuilder::new(Rc::new(renderer_factory.clone()))
            .error_handler(errors.clone())
            .config(self.config);
        let injector = match (self.injector, self.providers.is_empty()) {
            (Some(parent), true) => Some(parent),
            (parent, false) => {
                let parent = parent.unwrap_or_else(|| Rc::new(NullInjector));
                let module: Rc<dyn Injector> =
                    ModuleInjector::named("fixture", self.providers, parent)?;
                Some(module)
            }
            (None, true) => None,
        };
        if let Some(injector) = injector {
            builder = builder.injector(injector);
        }
        if let Some(sanitizer) = self.sanitizer {
            builder = builder.sanitizer(sanitizer);
        }
        let env = builder.build();
        let component = factory.create(env.clone(), self.projectable_nodes, None)?;
        Ok(ComponentFixture {
            runtime: StdRuntime::new(env),
            renderer_factory,
            renderer,
            errors,
            component,
            config: self.config,
        })
    }
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Headless harness around one component instance.
///
/// Creating a fixture does not run change detection. Call
/// [`ComponentFixture::detect_changes`] explicitly, or enable
/// [`ComponentFixture::auto_detect_changes`] and let events schedule ticks
/// that [`ComponentFixture::when_stable`] drains.
pub struct ComponentFixture {
    runtime: StdRuntime,
    renderer_factory: MemoryRendererFactory,
    renderer: MemoryRenderer,
    errors: Rc<CollectingErrorHandler>,
    component: ComponentRef,
    config: EngineConfig,
}

impl ComponentFixture {
    /// Creates the component in a fresh development-mode environment.
    pub fn create(factory: &ComponentFactory) -> ViewResult<Self> {
        FixtureBuilder::new().create(factory)
    }

    pub fn builder() -> FixtureBuilder {
        FixtureBuilder::new()
    }

    /// Checks the component, then verifies in dev mode that nothing changed
    /// during the check.
    pub fn detect_changes(&self) -> ViewResult<()> {
        let host_view = self.component.host_view();
        host_view.detect_changes()?;
        if self.config.dev_mode {
            host_view.check_no_changes()?;
        }
        Ok(())
    }

    pub fn check_no_changes(&self) -> ViewResult<()> {
        self.component.host_view().check_no_changes()
    }

    /// Attaches the component to the fixture's application so that events
    /// and `mark_for_check` schedule ticks.
    pub fn auto_detect_changes(&self, enabled: bool) -> ViewResult<()> {
        let app = self.application();
        if enabled {
            app.attach_view(self.component.host_view())
        } else {
            app.detach_view(self.component.host_view());
            Ok(())
        }
    }

    /// Whether no tick is waiting to run.
    pub fn is_stable(&self) -> bool {
        !self.application().has_pending_tick()
    }

    /// Runs scheduled ticks until none is pending. Returns how many ran.
    pub fn when_stable(&self) -> ViewResult<usize> {
        self.runtime.run_until_stable(StdRuntime::DEFAULT_MAX_TICKS)
    }

    pub fn application(&self) -> Application {
        self.runtime.application()
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    pub fn component_ref(&self) -> &ComponentRef {
        &self.component
    }

    pub fn component_instance(&self) -> Value {
        self.component.instance()
    }

    pub fn with_component<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.component.instance().with(f)
    }

    pub fn with_component_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.component.instance().with_mut(f)
    }

    pub fn change_detector_ref(&self) -> ChangeDetectorRef {
        self.component.change_detector_ref()
    }

    /// The component's host element.
    pub fn native_element(&self) -> RNode {
        self.component.location().native_element()
    }

    pub fn renderer(&self) -> &MemoryRenderer {
        &self.renderer
    }

    /// `(begin, end)` render passes seen so far.
    pub fn render_passes(&self) -> (usize, usize) {
        self.renderer_factory.passes()
    }

    /// Concatenated text below the host element.
    pub fn text(&self) -> String {
        self.renderer.text_content(self.native_element())
    }

    /// Elements named `tag` below the host element, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<RNode> {
        let mut found = Vec::new();
        let mut stack = vec![self.native_element()];
        while let Some(node) = stack.pop() {
            for child in self.renderer.children(node).into_iter().rev() {
                stack.push(child);
            }
            if node != self.native_element()
                && self.renderer.tag_name(node).as_deref() == Some(tag)
            {
                found.push(node);
            }
        }
        found
    }

    pub fn find(&self, tag: &str) -> Option<RNode> {
        self.find_all(tag).into_iter().next()
    }

    /// Delivers `event_name` to `node`. Returns `false` if a handler
    /// prevented the default action.
    pub fn dispatch(&self, node: RNode, event_name: &str, event: Value) -> bool {
        self.renderer.dispatch_event(node, event_name, &event)
    }

    pub fn click(&self, node: RNode) -> bool {
        self.dispatch(node, "click", Value::Null)
    }

    /// Errors reported to the environment's error handler.
    pub fn errors(&self) -> Vec<ViewError> {
        self.errors.errors()
    }

    pub fn take_errors(&self) -> Vec<ViewError> {
        self.errors.take()
    }

    pub fn dump_tree(&self) -> String {
        self.renderer.dump_tree(Some(self.native_element()))
    }

    pub fn destroy(&self) -> ViewResult<()> {
        self.application().detach_view(self.component.host_view());
        self.component.destroy()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// [`ComponentFixture`].
pub fn run_test_component<R>(
    factory: &ComponentFactory,
    f: impl FnOnce(&ComponentFixture) -> R,
) -> ViewResult<R> {
    let fixture = ComponentFixture::create(factory)?;
    let result = f(&fixture);
    fixture.destroy()?;
    Ok(result)
}

#[cfg(test)]
#[path = "tests/fixture_tests.rs"]
mod tests;
