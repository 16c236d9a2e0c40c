use super::provider::{Provider, ProviderKind};
use crate::collections::map::{Entry, HashMap};
use crate::error::{InjectError, InjectErrorKind};
use crate::token::{InjectFlags, Token};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Resolves tokens to values.
///
/// `not_found` is returned when nothing provides the token; `None` means
/// "fail with `NoProvider`".
pub trait Injector {
    fn get(
        &self,
        token: Token,
        not_found: Option<Value>,
        flags: InjectFlags,
    ) -> Result<Value, InjectError>;

    fn resolve(&self, token: Token) -> Result<Value, InjectError> {
        self.get(token, None, InjectFlags::empty())
    }
}

/// Terminates every injector chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInjector;

impl Injector for NullInjector {
    fn get(
        &self,
        token: Token,
        not_found: Option<Value>,
        flags: InjectFlags,
    ) -> Result<Value, InjectError> {
        match not_found {
            Some(value) => Ok(value),
            None if flags.contains(InjectFlags::OPTIONAL) => Ok(Value::Null),
            None => Err(InjectError::no_provider(token)),
        }
    }
}

enum Resolution {
    Pending,
    Resolving,
    Resolved(Value),
}

struct Record {
    contributions: Vec<ProviderKind>,
    multi: bool,
    state: Resolution,
}

/// Flat token → record store with a lazily populated instance cache and a
/// parent link.
///
/// Every resolved record is a singleton for this injector. A record is marked
/// as resolving before its dependencies are resolved, so a dependency cycle
/// fails with `CircularDependency` instead of recursing forever.
pub struct ModuleInjector {
    name: Rc<str>,
    parent: Rc<dyn Injector>,
    records: RefCell<HashMap<Token, Record>>,
    this: Weak<ModuleInjector>,
    destroyed: Cell<bool>,
    on_destroy: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl ModuleInjector {
    pub fn new(
        providers: Vec<Provider>,
        parent: Rc<dyn Injector>,
    ) -> Result<Rc<Self>, InjectError> {
        Self::named("module", providers, parent)
    }

    pub fn root(providers: Vec<Provider>) -> Result<Rc<Self>, InjectError> {
        Self::named("root", providers, Rc::new(NullInjector))
    }

    pub fn named(
        name: &str,
        providers: Vec<Provider>,
        parent: Rc<dyn Injector>,
    ) -> Result<Rc<Self>, InjectError> {
        let mut records: HashMap<Token, Record> = HashMap::default();
        for provider in providers {
            match records.entry(provider.token) {
                Entry::Occupied(mut occupied) => {
                    let record = occupied.get_mut();
                    if record.multi != provider.multi {
                        return Err(InjectError::new(InjectErrorKind::MixedMultiProvider(
                            provider.token,
                        )));
                    }
                    if provider.multi {
                        record.contributions.push(provider.kind);
                    } else {
                        record.contributions = vec![provider.kind];
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Record {
                        contributions: vec![provider.kind],
                        multi: provider.multi,
                        state: Resolution::Pending,
                    });
                }
            }
        }
        log::trace!("creating {name} injector with {} records", records.len());
        Ok(Rc::new_cyclic(|this| Self {
            name: Rc::from(name),
            parent,
            records: RefCell::new(records),
            this: this.clone(),
            destroyed: Cell::new(false),
            on_destroy: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_record(&self, token: Token) -> bool {
        self.records.borrow().contains_key(&token)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Registers a callback run once when the injector is destroyed.
    pub fn on_destroy(&self, callback: impl FnOnce() + 'static) {
        self.on_destroy.borrow_mut().push(Box::new(callback));
    }

    /// Runs destroy callbacks and drops every cached instance.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.on_destroy.borrow_mut());
        for callback in callbacks {
            callback();
        }
        self.records.borrow_mut().clear();
    }

    fn resolve_own(&self, token: Token) -> Option<Result<Value, InjectError>> {
        let contributions = {
            let mut records = self.records.borrow_mut();
            let record = records.get_mut(&token)?;
            match &record.state {
                Resolution::Resolved(value) => return Some(Ok(value.clone())),
                Resolution::Resolving => return Some(Err(InjectError::circular(token))),
                Resolution::Pending => {}
            }
            record.state = Resolution::Resolving;
            (record.contributions.clone(), record.multi)
        };
        let (contributions, multi) = contributions;
        let result = if multi {
            contributions
                .iter()
                .map(|kind| self.instantiate(kind))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::list)
        } else {
            match contributions.first() {
                Some(kind) => self.instantiate(kind),
                None => Ok(Value::Null),
            }
        };
        let mut records = self.records.borrow_mut();
        match result {
            Ok(value) => {
                if let Some(record) = records.get_mut(&token) {
                    record.state = Resolution::Resolved(value.clone());
                }
                Some(Ok(value))
            }
            Err(err) => {
                if let Some(record) = records.get_mut(&token) {
                    record.state = Resolution::Pending;
                }
                Some(Err(err.with_token(token)))
            }
        }
    }

    fn instantiate(&self, kind: &ProviderKind) -> Result<Value, InjectError> {
        match kind {
            ProviderKind::Value(value) => Ok(value.clone()),
            ProviderKind::Existing(existing) => self.get(*existing, None, InjectFlags::empty()),
            ProviderKind::Factory { factory, deps } => {
                let mut args = Vec::with_capacity(deps.len());
                for dep in deps {
                    let not_found = dep
                        .flags
                        .contains(InjectFlags::OPTIONAL)
                        .then_some(Value::Null);
                    args.push(self.get(dep.token, not_found, dep.flags)?);
                }
                factory(&args)
            }
        }
    }
}

impl Injector for ModuleInjector {
    fn get(
        &self,
        token: Token,
        not_found: Option<Value>,
        flags: InjectFlags,
    ) -> Result<Value, InjectError> {
        if self.destroyed.get() {
            return Err(InjectError::new(InjectErrorKind::Destroyed));
        }
        let not_found = match not_found {
            None if flags.contains(InjectFlags::OPTIONAL) => Some(Value::Null),
            other => other,
        };
        if !flags.contains(InjectFlags::SKIP_SELF) {
            if token == Token::INJECTOR {
                if let Some(this) = self.this.upgrade() {
                    return Ok(Value::from_rc(this));
                }
            }
            if let Some(result) = self.resolve_own(token) {
                return result;
            }
        }
        if flags.contains(InjectFlags::SELF) {
            return not_found.ok_or_else(|| InjectError::no_provider(token));
        }
        self.parent
            .get(token, not_found, flags & InjectFlags::OPTIONAL)
    }
}
