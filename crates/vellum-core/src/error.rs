//! Error taxonomy for dependency injection and the view engine.

use crate::token::Token;
use std::fmt::Write;
use thiserror::Error;

/// Reason a token could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectErrorKind {
    #[error("No provider for {0}!")]
    NoProvider(Token),
    #[error("Cannot instantiate cyclic dependency! {0}")]
    CircularDependency(Token),
    #[error("Cannot mix multi providers and regular providers for {0}")]
    MixedMultiProvider(Token),
    #[error("No provider for {0} found in the element injector tree")]
    NotFound(Token),
    #[error("Injector has already been destroyed")]
    Destroyed,
    #[error("factory failed: {0}")]
    Factory(String),
}

/// A resolution failure together with the chain of tokens that led to it.
///
/// The path is ordered outermost first: resolving `A` which needs `B` which
/// needs the missing `C` yields `[A, B, C]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", render_path(.path))]
pub struct InjectError {
    pub kind: InjectErrorKind,
    pub path: Vec<Token>,
}

fn render_path(path: &[Token]) -> String {
    if path.len() < 2 {
        return String::new();
    }
    let mut out = String::from(" (");
    for (i, token) in path.iter().enumerate() {
        if i > 0 {
            out.push_str(" -> ");
        }
        let _ = write!(out, "{token}");
    }
    out.push(')');
    out
}

impl InjectError {
    pub fn new(kind: InjectErrorKind) -> Self {
        let path = match &kind {
            InjectErrorKind::NoProvider(token)
            | InjectErrorKind::CircularDependency(token)
            | InjectErrorKind::MixedMultiProvider(token)
            | InjectErrorKind::NotFound(token) => vec![*token],
            InjectErrorKind::Destroyed | InjectErrorKind::Factory(_) => Vec::new(),
        };
        Self { kind, path }
    }

    pub fn no_provider(token: Token) -> Self {
        Self::new(InjectErrorKind::NoProvider(token))
    }

    pub fn circular(token: Token) -> Self {
        Self::new(InjectErrorKind::CircularDependency(token))
    }

    pub fn not_found(token: Token) -> Self {
        Self::new(InjectErrorKind::NotFound(token))
    }

    pub fn factory(message: impl Into<String>) -> Self {
        Self::new(InjectErrorKind::Factory(message.into()))
    }

    /// Prepends `token` to the resolution path unless it is already the head.
    pub fn with_token(mut self, token: Token) -> Self {
        if self.path.first() != Some(&token) {
            self.path.insert(0, token);
        }
        self
    }

    pub fn is_circular(&self) -> bool {
        matches!(self.kind, InjectErrorKind::CircularDependency(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            InjectErrorKind::NoProvider(_) | InjectErrorKind::NotFound(_)
        )
    }
}

/// Failures raised while building, creating, checking or editing views.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    #[error(transparent)]
    Inject(#[from] InjectError),
    #[error("Illegal state: {0}")]
    IllegalState(String),
    #[error(
        "ExpressionChangedAfterItHasBeenCheckedError: Expression has changed after it was checked. \
         Previous value: '{previous}'. Current value: '{current}'.{}",
        first_check_hint(.first_check)
    )]
    ExpressionChanged {
        previous: String,
        current: String,
        first_check: bool,
    },
    #[error("ViewDestroyedError: Attempt to use a destroyed view: {0}")]
    ViewDestroyed(&'static str),
    #[error("tick() is called recursively")]
    RecursiveTick,
    #[error("The selector {0:?} did not match any elements")]
    SelectorNotFound(String),
    #[error("{0}")]
    Application(String),
}

fn first_check_hint(first_check: &bool) -> &'static str {
    if *first_check {
        " It seems like the view has been created after its parent and its children have been dirty checked. Has it been created in a change detection hook?"
    } else {
        ""
    }
}

impl ViewError {
    pub fn illegal_state(message: impl Into<String>) -> Self {
        ViewError::IllegalState(message.into())
    }

    /// Error raised by application code (hooks, handlers, factories).
    pub fn application(message: impl Into<String>) -> Self {
        ViewError::Application(message.into())
    }
}

pub type ViewResult<T> = Result<T, ViewError>;
