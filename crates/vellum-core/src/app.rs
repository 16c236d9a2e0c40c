//! Application: the set of root views checked together on every tick.

use crate::component::{ComponentFactory, ComponentRef};
use crate::config::EngineConfig;
use crate::di::{Injector, NullInjector};
use crate::error::{ViewError, ViewResult};
use crate::platform::{NoopScheduler, TickScheduler};
use crate::render::{NoopSanitizer, RendererFactory, Sanitizer};
use crate::view::{Environment, RootSelector, ViewRef};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Receives errors that escape event handlers and ticks.
pub trait ErrorHandler {
    fn handle_error(&self, error: &ViewError);
}

/// Reports errors through `log::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn handle_error(&self, error: &ViewError) {
        log::error!("{error}");
    }
}

/// Builds an [`Environment`] from the pieces that are usually swapped out.
pub struct EnvironmentBuilder {
    renderer_factory: Rc<dyn RendererFactory>,
    injector: Rc<dyn Injector>,
    sanitizer: Rc<dyn Sanitizer>,
    error_handler: Rc<dyn ErrorHandler>,
    config: EngineConfig,
}

impl EnvironmentBuilder {
    pub fn new(renderer_factory: Rc<dyn RendererFactory>) -> Self {
        Self {
            renderer_factory,
            injector: Rc::new(NullInjector),
            sanitizer: Rc::new(NoopSanitizer),
            error_handler: Rc::new(LoggingErrorHandler),
            config: EngineConfig::default(),
        }
    }

    pub fn injector(mut self, injector: Rc<dyn Injector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn sanitizer(mut self, sanitizer: Rc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn error_handler(mut self, error_handler: Rc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Environment {
        Environment {
            injector: self.injector,
            renderer_factory: self.renderer_factory,
            sanitizer: self.sanitizer,
            error_handler: self.error_handler,
            config: self.config,
        }
    }
}

struct AppInner {
    env: Environment,
    scheduler: Rc<dyn TickScheduler>,
    views: RefCell<Vec<ViewRef>>,
    running: Cell<bool>,
    tick_pending: Cell<bool>,
}

impl AppInner {
    fn request_tick(&self) {
        if !self.tick_pending.replace(true) {
            self.scheduler.schedule_tick();
        }
    }
}

/// Owns the attached root views and runs change detection over them.
///
/// Any event dispatched into an attached view requests a tick through the
/// [`TickScheduler`]. Requests are coalesced until the tick runs.
#[derive(Clone)]
pub struct Application {
    inner: Rc<AppInner>,
}

impl Application {
    pub fn new(env: Environment, scheduler: Rc<dyn TickScheduler>) -> Self {
        Self {
            inner: Rc::new(AppInner {
                env,
                scheduler,
                views: RefCell::new(Vec::new()),
                running: Cell::new(false),
                tick_pending: Cell::new(false),
            }),
        }
    }

    /// Application that ticks only when asked to.
    pub fn manual(env: Environment) -> Self {
        Self::new(env, Rc::new(NoopScheduler))
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.env
    }

    /// Creates the component into the element matching `selector`, attaches
    /// it and runs a first tick.
    pub fn bootstrap(&self, factory: &ComponentFactory, selector: &str) -> ViewResult<ComponentRef> {
        let component = factory.create(
            self.inner.env.clone(),
            Vec::new(),
            Some(RootSelector::Selector(selector.to_string())),
        )?;
        self.attach_view(component.host_view())?;
        log::info!("bootstrapped {} into {selector:?}", factory.selector());
        self.tick()?;
        Ok(component)
    }

    /// Adds a root view to the set checked on every tick.
    pub fn attach_view(&self, view: &ViewRef) -> ViewResult<()> {
        let data = view.data();
        data.ensure_alive("attachView")?;
        if data.container_parent.borrow().is_some() {
            return Err(ViewError::illegal_state(
                "This view is already attached to a ViewContainer!",
            ));
        }
        let weak: Weak<AppInner> = Rc::downgrade(&self.inner);
        data.root.set_on_dirty(Some(Rc::new(move || {
            if let Some(app) = weak.upgrade() {
                app.request_tick();
            }
        })));
        let mut views = self.inner.views.borrow_mut();
        if !views.iter().any(|v| v.ptr_eq(view)) {
            views.push(view.clone());
        }
        Ok(())
    }

    pub fn detach_view(&self, view: &ViewRef) {
        self.inner.views.borrow_mut().retain(|v| !v.ptr_eq(view));
        view.data().root.set_on_dirty(None);
    }

    pub fn view_count(&self) -> usize {
        self.inner.views.borrow().len()
    }

    /// Asks the scheduler for a tick unless one is already pending.
    pub fn request_tick(&self) {
        self.inner.request_tick();
    }

    pub fn has_pending_tick(&self) -> bool {
        self.inner.tick_pending.get()
    }

    /// Runs the pending tick, if any. Returns whether one ran.
    pub fn run_pending(&self) -> ViewResult<bool> {
        if !self.has_pending_tick() {
            return Ok(false);
        }
        self.tick()?;
        Ok(true)
    }

    /// Checks every attached root view, then verifies in dev mode that a
    /// second pass sees no changes. Errors are passed to the error handler
    /// and returned.
    pub fn tick(&self) -> ViewResult<()> {
        if self.inner.running.replace(true) {
            return Err(ViewError::RecursiveTick);
        }
        self.inner.tick_pending.set(false);
        let result = self.check_views();
        self.inner.running.set(false);
        if let Err(err) = &result {
            self.inner.env.error_handler.handle_error(err);
        }
        result
    }

    fn check_views(&self) -> ViewResult<()> {
        let views: Vec<ViewRef> = {
            let mut views = self.inner.views.borrow_mut();
            views.retain(|v| !v.is_destroyed());
            views.clone()
        };
        log::debug!("tick over {} root views", views.len());
        for view in &views {
            view.detect_changes()?;
        }
        if self.inner.env.config.dev_mode {
            for view in &views {
                view.check_no_changes()?;
            }
        }
        Ok(())
    }

    /// Destroys every attached root view.
    pub fn destroy(&self) -> ViewResult<()> {
        let views = std::mem::take(&mut *self.inner.views.borrow_mut());
        for view in views {
            view.data().root.set_on_dirty(None);
            view.destroy()?;
        }
        Ok(())
    }
}
