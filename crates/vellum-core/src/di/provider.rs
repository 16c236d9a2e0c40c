use crate::error::InjectError;
use crate::token::{Dep, Token};
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Factory producing an instance from its resolved dependencies, in the order
/// they were declared.
pub type FactoryFn = Rc<dyn Fn(&[Value]) -> Result<Value, InjectError>>;

#[derive(Clone)]
pub enum ProviderKind {
    Value(Value),
    Factory { factory: FactoryFn, deps: Vec<Dep> },
    Existing(Token),
}

/// Declaration registering `token` in a module injector.
#[derive(Clone)]
pub struct Provider {
    pub token: Token,
    pub kind: ProviderKind,
    pub multi: bool,
}

impl Provider {
    pub fn value(token: Token, value: impl Into<Value>) -> Self {
        Self {
            token,
            kind: ProviderKind::Value(value.into()),
            multi: false,
        }
    }

    pub fn factory(
        token: Token,
        deps: Vec<Dep>,
        factory: impl Fn(&[Value]) -> Result<Value, InjectError> + 'static,
    ) -> Self {
        Self {
            token,
            kind: ProviderKind::Factory {
                factory: Rc::new(factory),
                deps,
            },
            multi: false,
        }
    }

    /// Class provider: the token is the type itself and the constructor is a
    /// factory over `deps`.
    pub fn class<T: 'static>(
        deps: Vec<Dep>,
        construct: impl Fn(&[Value]) -> Result<T, InjectError> + 'static,
    ) -> Self {
        Self::factory(Token::of::<T>(), deps, move |args| {
            construct(args).map(Value::object)
        })
    }

    pub fn existing(token: Token, existing: Token) -> Self {
        Self {
            token,
            kind: ProviderKind::Existing(existing),
            multi: false,
        }
    }

    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ProviderKind::Value(_) => "value",
            ProviderKind::Factory { .. } => "factory",
            ProviderKind::Existing(_) => "existing",
        };
        f.debug_struct("Provider")
            .field("token", &self.token)
            .field("kind", &kind)
            .field("multi", &self.multi)
            .finish()
    }
}
