//! Element injector: resolves dependencies through the element tree of the
//! views, using each element's bloom overlay to skip elements and whole
//! ancestor chains that cannot provide a token.

use super::Injector;
use crate::error::{InjectError, InjectErrorKind, ViewError};
use crate::render::RendererHandle;
use crate::token::{Dep, InjectFlags, Token};
use crate::value::Value;
use crate::view::data::{NodeData, ViewData, ViewInner};
use crate::view::def::NodeFlags;
use crate::view::{instantiate_provider, ChangeDetectorRef, ElementRef, TemplateRef, ViewContainerRef};
use std::fmt;
use std::rc::{Rc, Weak};

/// Injector bound to one element of a live view.
///
/// Resolution starts at the element, walks up through its ancestors and the
/// host elements of the enclosing views, and falls back to the application's
/// module injector.
#[derive(Clone)]
pub struct ElementInjector {
    view: Weak<ViewInner>,
    element: usize,
}

impl ElementInjector {
    pub(crate) fn new(view: &ViewData, element: usize) -> Self {
        Self {
            view: view.downgrade(),
            element,
        }
    }

    pub fn element_index(&self) -> usize {
        self.element
    }
}

impl Injector for ElementInjector {
    fn get(
        &self,
        token: Token,
        not_found: Option<Value>,
        flags: InjectFlags,
    ) -> Result<Value, InjectError> {
        let view = ViewData::from_weak(&self.view)
            .ok_or_else(|| InjectError::new(InjectErrorKind::Destroyed))?;
        resolve_dep(
            &view,
            Some(self.element),
            false,
            Dep::with_flags(token, flags),
            not_found,
        )
    }
}

impl fmt::Debug for ElementInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementInjector")
            .field("element", &self.element)
            .finish()
    }
}

/// Resolves `token` from `injector` with `flags`.
pub fn get_or_create_injectable(
    injector: &ElementInjector,
    token: Token,
    flags: InjectFlags,
) -> Result<Value, InjectError> {
    injector.get(token, None, flags)
}

/// Flattens a view failure raised while creating a provider in the middle of
/// an injection walk.
pub(crate) fn into_inject_error(err: ViewError) -> InjectError {
    match err {
        ViewError::Inject(err) => err,
        other => InjectError::factory(other.to_string()),
    }
}

/// Resolves `dep` for a node whose element is `element` in `view`.
///
/// `allow_private` lets the walk see private providers on the starting
/// element; it is set for components and private providers. `not_found` is
/// returned instead of an error when nothing provides the token.
pub(crate) fn resolve_dep(
    view: &ViewData,
    element: Option<usize>,
    allow_private: bool,
    dep: Dep,
    not_found: Option<Value>,
) -> Result<Value, InjectError> {
    let token = dep.token;
    let flags = dep.flags;
    let not_found = not_found.or_else(|| flags.contains(InjectFlags::OPTIONAL).then_some(Value::Null));

    let mut allow_private = allow_private;
    let mut cursor = element.map(|el| (view.clone(), el));
    if token == Token::CHANGE_DETECTOR_REF {
        allow_private = element
            .map(|el| view.node_def(el).flags.contains(NodeFlags::COMPONENT_VIEW))
            .unwrap_or(false);
    }
    if flags.contains(InjectFlags::SKIP_SELF) {
        allow_private = false;
        cursor = cursor
            .and_then(|(v, el)| parent_element(&v, el))
            .map(|(v, el, crossed_component)| {
                allow_private = crossed_component;
                (v, el)
            });
    }

    let bloom_bit = token.bloom_bit();
    let mut last_step = false;
    while let Some((search_view, el)) = cursor.take() {
        if token.is_special() {
            if let Some(value) = resolve_special(&search_view, el, token, allow_private) {
                return Ok(value);
            }
        } else {
            let Some(bit) = bloom_bit else {
                break;
            };
            let bloom = match search_view.node(el) {
                NodeData::Element(data) => data.bloom,
                _ => break,
            };
            if !bloom.cumulative.contains(bit) {
                break;
            }
            if bloom.own.contains(bit) {
                if let Some(value) = lookup_element_provider(&search_view, el, token, allow_private)? {
                    return Ok(value);
                }
            }
        }
        if last_step || flags.contains(InjectFlags::SELF) {
            break;
        }
        if let Some((next_view, next_el, crossed_component)) = parent_element(&search_view, el) {
            allow_private = crossed_component;
            if crossed_component && flags.contains(InjectFlags::HOST) {
                last_step = true;
            }
            cursor = Some((next_view, next_el));
        }
    }

    if flags.intersects(InjectFlags::SELF | InjectFlags::HOST) {
        return not_found.ok_or_else(|| InjectError::not_found(token));
    }
    let module_flags = flags & InjectFlags::OPTIONAL;
    view.root.env.injector.get(token, not_found, module_flags)
}

/// Next element up: the nearest element ancestor in the same view, or the
/// host element or anchor in the parent view. The flag reports whether the
/// step left a component view.
fn parent_element(view: &ViewData, element: usize) -> Option<(ViewData, usize, bool)> {
    let mut parent = view.node_def(element).parent;
    while let Some(p) = parent {
        let node = view.node_def(p);
        if node.flags.contains(NodeFlags::TYPE_ELEMENT) {
            return Some((view.clone(), p, false));
        }
        parent = node.parent;
    }
    let parent_view = view.parent_view()?;
    let host = view.parent_node?;
    Some((parent_view, host, view.is_component_view()))
}

fn resolve_special(view: &ViewData, element: usize, token: Token, allow_private: bool) -> Option<Value> {
    let data = match view.node(element) {
        NodeData::Element(data) => data,
        _ => return None,
    };
    match token {
        Token::ELEMENT_REF => Some(Value::from_rc(Rc::new(ElementRef::new(data.render_element)))),
        Token::VIEW_CONTAINER_REF => data
            .view_container
            .as_ref()
            .map(|_| Value::from_rc(Rc::new(ViewContainerRef::new(view, element)))),
        Token::TEMPLATE_REF => data
            .template
            .as_ref()
            .map(|_| Value::from_rc(Rc::new(TemplateRef::new(view, element)))),
        Token::CHANGE_DETECTOR_REF => {
            let cd_view = find_comp_view(view, element, allow_private);
            Some(Value::from_rc(Rc::new(ChangeDetectorRef::new(&cd_view))))
        }
        Token::RENDERER => {
            let cd_view = find_comp_view(view, element, allow_private);
            Some(Value::from_rc(Rc::new(RendererHandle(Rc::clone(
                &cd_view.renderer,
            )))))
        }
        Token::INJECTOR => Some(Value::from_rc(Rc::new(ElementInjector::new(view, element)))),
        _ => None,
    }
}

fn find_comp_view(view: &ViewData, element: usize, allow_private: bool) -> ViewData {
    if allow_private {
        if let Some(component_view) = view.component_view(element) {
            return component_view;
        }
    }
    view.component_or_root_view()
}

/// Looks `token` up among the providers declared on `element`. Later
/// declarations shadow earlier ones.
fn lookup_element_provider(
    view: &ViewData,
    element: usize,
    token: Token,
    allow_private: bool,
) -> Result<Option<Value>, InjectError> {
    let Some(el) = view.node_def(element).as_element() else {
        return Ok(None);
    };
    for &index in el.providers.iter().rev() {
        let node = view.node_def(index);
        let Some(provider) = node.provider() else {
            continue;
        };
        if provider.token != token {
            continue;
        }
        if node.flags.contains(NodeFlags::PRIVATE_PROVIDER) && !allow_private {
            continue;
        }
        return match view.node(index) {
            NodeData::Provider(instance) => Ok(Some(instance.value())),
            NodeData::Creating => Err(InjectError::circular(token)),
            _ if node.flags.contains(NodeFlags::TYPE_DIRECTIVE) => {
                Err(InjectError::circular(token))
            }
            _ => instantiate_provider(view, index)
                .map(|instance| Some(instance.value()))
                .map_err(into_inject_error),
        };
    }
    Ok(None)
}
