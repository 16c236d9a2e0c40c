//! Injection tokens, resolution flags and dependency descriptors.

use crate::collections::map::HashMap;
use bitflags::bitflags;
use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identity of something that can be injected.
///
/// Tokens are cheap `Copy` handles into a thread-local registry holding their
/// display names and bloom bits. The engine is single threaded, so tokens are
/// only meaningful on the thread that created them.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u32);

const FIRST_DYNAMIC_TOKEN: u32 = 16;
const BLOOM_SIZE: u32 = 256;

struct TokenRegistry {
    names: HashMap<u32, Rc<str>>,
    by_type: HashMap<TypeId, Token>,
    bloom_bits: HashMap<Token, u8>,
    next_id: u32,
    next_bloom_bit: u32,
}

impl TokenRegistry {
    fn new() -> Self {
        Self {
            names: HashMap::default(),
            by_type: HashMap::default(),
            bloom_bits: HashMap::default(),
            next_id: FIRST_DYNAMIC_TOKEN,
            next_bloom_bit: 0,
        }
    }

    fn allocate(&mut self, name: &str) -> Token {
        let id = self.next_id;
        self.next_id += 1;
        self.names.insert(id, Rc::from(name));
        Token(id)
    }
}

thread_local! {
    static REGISTRY: RefCell<TokenRegistry> = RefCell::new(TokenRegistry::new());
}

impl Token {
    pub const ELEMENT_REF: Token = Token(1);
    pub const TEMPLATE_REF: Token = Token(2);
    pub const VIEW_CONTAINER_REF: Token = Token(3);
    pub const CHANGE_DETECTOR_REF: Token = Token(4);
    pub const INJECTOR: Token = Token(5);
    pub const RENDERER: Token = Token(6);

    /// Creates a fresh token; two calls with the same name yield distinct
    /// tokens.
    pub fn new(name: &str) -> Token {
        REGISTRY.with(|registry| registry.borrow_mut().allocate(name))
    }

    /// Token identifying type `T`; repeated calls return the same token.
    pub fn of<T: 'static>() -> Token {
        REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            let type_id = TypeId::of::<T>();
            if let Some(token) = registry.by_type.get(&type_id) {
                return *token;
            }
            let name = std::any::type_name::<T>();
            let short = name.rsplit("::").next().unwrap_or(name);
            let token = registry.allocate(short);
            registry.by_type.insert(type_id, token);
            token
        })
    }

    pub fn id(self) -> u32 {
        self.0
    }

    pub fn name(self) -> Rc<str> {
        match self {
            Token::ELEMENT_REF => Rc::from("ElementRef"),
            Token::TEMPLATE_REF => Rc::from("TemplateRef"),
            Token::VIEW_CONTAINER_REF => Rc::from("ViewContainerRef"),
            Token::CHANGE_DETECTOR_REF => Rc::from("ChangeDetectorRef"),
            Token::INJECTOR => Rc::from("Injector"),
            Token::RENDERER => Rc::from("Renderer"),
            _ => REGISTRY.with(|registry| {
                registry
                    .borrow()
                    .names
                    .get(&self.0)
                    .cloned()
                    .unwrap_or_else(|| Rc::from(format!("Token#{}", self.0)))
            }),
        }
    }

    pub fn is_special(self) -> bool {
        self.0 < FIRST_DYNAMIC_TOKEN
    }

    /// Bloom bit of a token that was registered at some node, if any.
    pub fn bloom_bit(self) -> Option<u8> {
        REGISTRY.with(|registry| registry.borrow().bloom_bits.get(&self).copied())
    }

    /// Returns the token's bloom bit, assigning the next free one on first
    /// use. Bits wrap modulo 256, so distinct tokens may share a bit.
    pub fn assign_bloom_bit(self) -> u8 {
        REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            if let Some(bit) = registry.bloom_bits.get(&self) {
                return *bit;
            }
            let bit = (registry.next_bloom_bit % BLOOM_SIZE) as u8;
            registry.next_bloom_bit += 1;
            registry.bloom_bits.insert(self, bit);
            bit
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}, {})", self.0, self.name())
    }
}

bitflags! {
    /// Modifiers applied to a single resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InjectFlags: u8 {
        /// Return null instead of failing when nothing provides the token.
        const OPTIONAL = 1 << 0;
        /// Only look at the starting injector.
        const SELF = 1 << 1;
        /// Start at the parent of the starting injector.
        const SKIP_SELF = 1 << 2;
        /// Stop at the boundary of the current component view.
        const HOST = 1 << 3;
    }
}

/// Normalized dependency declaration `{token, flags}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dep {
    pub token: Token,
    pub flags: InjectFlags,
}

impl Dep {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            flags: InjectFlags::empty(),
        }
    }

    pub fn with_flags(token: Token, flags: InjectFlags) -> Self {
        Self { token, flags }
    }

    pub fn optional(mut self) -> Self {
        self.flags |= InjectFlags::OPTIONAL;
        self
    }

    pub fn self_only(mut self) -> Self {
        self.flags |= InjectFlags::SELF;
        self
    }

    pub fn skip_self(mut self) -> Self {
        self.flags |= InjectFlags::SKIP_SELF;
        self
    }

    pub fn host(mut self) -> Self {
        self.flags |= InjectFlags::HOST;
        self
    }
}

impl From<Token> for Dep {
    fn from(token: Token) -> Self {
        Dep::new(token)
    }
}
