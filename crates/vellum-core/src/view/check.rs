//! Check-and-update and no-changes traversals.

use super::create::create_view_nodes;
use super::data::{InitState, NodeData, ProviderInstance, ViewData, ViewState};
use super::def::{BindingDef, BindingKind, NodeDef, NodeFlags, NodeKind, PureKind};
use super::destroy::destroy_view;
use super::query::check_and_update_query;
use crate::collections::map::HashMap;
use crate::directive::{DirectiveInstance, SimpleChange, SimpleChanges};
use crate::error::{ViewError, ViewResult};
use crate::render::{RNode, SecurityContext};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewAction {
    CreateViewNodes,
    CheckAndUpdate,
    CheckAndUpdateProjectedViews,
    CheckNoChanges,
    CheckNoChangesProjectedViews,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    CheckAndUpdate,
    CheckNoChanges,
}

/// Hooks that run for a directive even when the update function never
/// mentions it.
const IMPLICIT_CHECK_HOOKS: NodeFlags = NodeFlags::ON_INIT.union(NodeFlags::DO_CHECK);

/// Handle passed to a view's update functions.
///
/// Update functions report the current binding values of each node in node
/// order through [`NodeCheck::node`]. Directives that declare `ON_INIT` or
/// `DO_CHECK` but have no bindings are checked implicitly, in node order.
pub struct NodeCheck<'a> {
    view: &'a ViewData,
    check_type: CheckType,
    flush_hooks: bool,
    next_directive: usize,
}

impl<'a> NodeCheck<'a> {
    fn new(view: &'a ViewData, check_type: CheckType, flush_hooks: bool) -> Self {
        Self {
            view,
            check_type,
            flush_hooks,
            next_directive: 0,
        }
    }

    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    /// The component instance owning the view.
    pub fn component(&self) -> Value {
        self.view
            .component()
            .map(|c| c.value())
            .unwrap_or_default()
    }

    /// The view context: the component for component views, the template
    /// context for embedded views.
    pub fn context(&self) -> Value {
        self.view.context()
    }

    /// Current value of a node: directive, pipe or provider instances, the
    /// last pure expression result, or an `ElementRef`.
    pub fn node_value(&self, index: usize) -> Value {
        super::event::node_value(self.view, index)
    }

    /// Checks node `index` against `values`, one per binding, and returns the
    /// node's pure expression value (`Null` for other kinds).
    pub fn node(&mut self, index: usize, values: &[Value]) -> ViewResult<Value> {
        let def = &self.view.def;
        let node = def.nodes.get(index).ok_or_else(|| {
            ViewError::illegal_state(format!("no node at index {index} to check"))
        })?;
        if values.len() > node.bindings.len() {
            return Err(ViewError::illegal_state(format!(
                "node {index} has {} bindings but {} values were checked",
                node.bindings.len(),
                values.len()
            )));
        }
        match self.check_type {
            CheckType::CheckAndUpdate => {
                if self.flush_hooks && node.flags.contains(NodeFlags::TYPE_DIRECTIVE) {
                    self.flush_until(index)?;
                    self.next_directive = index + 1;
                }
                check_and_update_node(self.view, node, values)?;
            }
            CheckType::CheckNoChanges => check_no_changes_node(self.view, node, values)?,
        }
        Ok(match self.view.node(index) {
            NodeData::Pure(value) => value,
            _ => Value::Null,
        })
    }

    /// Runs an impure pipe.
    pub fn pipe_transform(&mut self, pipe_node: usize, args: &[Value]) -> ViewResult<Value> {
        match self.view.provider(pipe_node) {
            Some(ProviderInstance::Pipe(pipe)) => pipe.transform(args),
            _ => Err(ViewError::illegal_state(format!(
                "node {pipe_node} is not a pipe"
            ))),
        }
    }

    fn flush_until(&mut self, end: usize) -> ViewResult<()> {
        let def = &self.view.def;
        for j in self.next_directive..end.min(def.nodes.len()) {
            let node = &def.nodes[j];
            if node.flags.contains(NodeFlags::TYPE_DIRECTIVE)
                && node.flags.intersects(IMPLICIT_CHECK_HOOKS)
            {
                check_and_update_directive(self.view, node, &[])?;
            }
        }
        self.next_directive = self.next_directive.max(end);
        Ok(())
    }

    fn finish(mut self) -> ViewResult<()> {
        if self.flush_hooks && self.check_type == CheckType::CheckAndUpdate {
            let len = self.view.def.nodes.len();
            self.flush_until(len)?;
        }
        Ok(())
    }
}

fn update_directives(view: &ViewData, check_type: CheckType) -> ViewResult<()> {
    let mut check = NodeCheck::new(view, check_type, true);
    if let Some(update) = view.def.update_directives.clone() {
        update(&mut check)?;
    }
    check.finish()
}

fn update_renderer(view: &ViewData, check_type: CheckType) -> ViewResult<()> {
    if let Some(update) = view.def.update_renderer.clone() {
        let mut check = NodeCheck::new(view, check_type, false);
        update(&mut check)?;
    }
    Ok(())
}

/// A view whose component is inside one of its own hooks cannot be checked:
/// the component is exclusively borrowed until the hook returns.
fn ensure_component_idle(view: &ViewData) -> ViewResult<()> {
    match view.component() {
        Some(component) if component.is_busy() => Err(ViewError::illegal_state(
            "view checked re-entrantly from a lifecycle hook of its own component",
        )),
        _ => Ok(()),
    }
}

pub(crate) fn check_and_update_view(view: &ViewData) -> ViewResult<()> {
    ensure_component_idle(view)?;
    if view.has_state(ViewState::BEFORE_FIRST_CHECK) {
        view.clear_state(ViewState::BEFORE_FIRST_CHECK);
        view.set_state(ViewState::FIRST_CHECK);
    } else {
        view.clear_state(ViewState::FIRST_CHECK);
    }
    shift_init_state(view, InitState::BeforeInit, InitState::CallingOnInit);
    mark_projected_views_for_check(view);
    update_directives(view, CheckType::CheckAndUpdate)?;
    exec_embedded_views_action(view, ViewAction::CheckAndUpdate)?;
    exec_queries_action(
        view,
        NodeFlags::TYPE_CONTENT_QUERY,
        NodeFlags::DYNAMIC_QUERY,
        CheckType::CheckAndUpdate,
    )?;
    let call_init = shift_init_state(
        view,
        InitState::CallingOnInit,
        InitState::CallingAfterContentInit,
    );
    let mut hooks = NodeFlags::AFTER_CONTENT_CHECKED;
    if call_init {
        hooks |= NodeFlags::AFTER_CONTENT_INIT;
    }
    call_lifecycle_hooks_child_first(view, hooks)?;

    update_renderer(view, CheckType::CheckAndUpdate)?;
    exec_component_views_action(view, ViewAction::CheckAndUpdate)?;
    exec_queries_action(
        view,
        NodeFlags::TYPE_VIEW_QUERY,
        NodeFlags::DYNAMIC_QUERY,
        CheckType::CheckAndUpdate,
    )?;
    let call_init = shift_init_state(
        view,
        InitState::CallingAfterContentInit,
        InitState::CallingAfterViewInit,
    );
    let mut hooks = NodeFlags::AFTER_VIEW_CHECKED;
    if call_init {
        hooks |= NodeFlags::AFTER_VIEW_INIT;
    }
    call_lifecycle_hooks_child_first(view, hooks)?;

    if view.def.is_on_push() {
        view.clear_state(ViewState::CHECKS_ENABLED);
    }
    view.clear_state(ViewState::CHECK_PROJECTED_VIEWS | ViewState::CHECK_PROJECTED_VIEW);
    shift_init_state(view, InitState::CallingAfterViewInit, InitState::AfterInit);
    Ok(())
}

pub(crate) fn check_no_changes_view(view: &ViewData) -> ViewResult<()> {
    ensure_component_idle(view)?;
    mark_projected_views_for_check(view);
    update_directives(view, CheckType::CheckNoChanges)?;
    exec_embedded_views_action(view, ViewAction::CheckNoChanges)?;
    update_renderer(view, CheckType::CheckNoChanges)?;
    exec_component_views_action(view, ViewAction::CheckNoChanges)?;
    view.clear_state(ViewState::CHECK_PROJECTED_VIEWS | ViewState::CHECK_PROJECTED_VIEW);
    Ok(())
}

/// Advances the init sub-state from `prior` to `next`. Returns whether the
/// hooks of `next` should run in this pass, which is also the case when an
/// earlier pass already advanced to `next` but was interrupted.
pub(crate) fn shift_init_state(view: &ViewData, prior: InitState, next: InitState) -> bool {
    let state = view.init_state.get();
    if state == prior {
        view.init_state.set(next);
        view.init_index.set(0);
        true
    } else {
        state == next
    }
}

/// Lets each init hook run exactly once: `init_index` only moves forward,
/// so a pass restarted after an error skips the hooks that already ran.
pub(crate) fn should_call_lifecycle_init_hook(
    view: &ViewData,
    init_state: InitState,
    index: usize,
) -> bool {
    if view.init_state.get() == init_state && view.init_index.get() <= index {
        view.init_index.set(index + 1);
        true
    } else {
        false
    }
}

fn mark_projected_views_for_check(view: &ViewData) {
    let def = &view.def;
    if !def.node_flags.contains(NodeFlags::EMBEDDED_VIEWS) {
        return;
    }
    for (i, node) in def.nodes.iter().enumerate() {
        let has_template = node.as_element().map(|el| el.template.is_some()).unwrap_or(false);
        if !has_template {
            continue;
        }
        let Some(template) = view.element(i).ok().and_then(|el| el.template) else {
            continue;
        };
        let projected = template.projected_views.borrow().clone();
        for projected_view in projected {
            projected_view.set_state(ViewState::CHECK_PROJECTED_VIEW);
            mark_parent_views_for_check_projected_views(&projected_view, view);
        }
    }
}

fn mark_parent_views_for_check_projected_views(view: &ViewData, end_view: &ViewData) {
    let mut current = Some(view.clone());
    while let Some(v) = current {
        if v == *end_view {
            break;
        }
        v.set_state(ViewState::CHECK_PROJECTED_VIEWS);
        current = v.container_parent_view().or_else(|| v.parent_view());
    }
}

pub(crate) fn call_view_action(view: &ViewData, action: ViewAction) -> ViewResult<()> {
    let state = view.state.get();
    let destroyed = state.contains(ViewState::DESTROYED);
    match action {
        ViewAction::Destroy => destroy_view(view),
        ViewAction::CreateViewNodes => create_view_nodes(view),
        ViewAction::CheckAndUpdate if !destroyed => {
            if state.contains(ViewState::CAT_DETECT_CHANGES) {
                check_and_update_view(view)
            } else if state.contains(ViewState::CHECK_PROJECTED_VIEWS) {
                exec_projected_views_action(view, ViewAction::CheckAndUpdateProjectedViews)
            } else {
                Ok(())
            }
        }
        ViewAction::CheckAndUpdateProjectedViews if !destroyed => {
            if state.contains(ViewState::CHECK_PROJECTED_VIEW) {
                check_and_update_view(view)
            } else if state.contains(ViewState::CHECK_PROJECTED_VIEWS) {
                exec_projected_views_action(view, action)
            } else {
                Ok(())
            }
        }
        ViewAction::CheckNoChanges if !destroyed => {
            if state.contains(ViewState::CAT_DETECT_CHANGES) {
                check_no_changes_view(view)
            } else if state.contains(ViewState::CHECK_PROJECTED_VIEWS) {
                exec_projected_views_action(view, ViewAction::CheckNoChangesProjectedViews)
            } else {
                Ok(())
            }
        }
        ViewAction::CheckNoChangesProjectedViews if !destroyed => {
            if state.contains(ViewState::CHECK_PROJECTED_VIEW) {
                check_no_changes_view(view)
            } else if state.contains(ViewState::CHECK_PROJECTED_VIEWS) {
                exec_projected_views_action(view, action)
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

fn exec_projected_views_action(view: &ViewData, action: ViewAction) -> ViewResult<()> {
    exec_embedded_views_action(view, action)?;
    exec_component_views_action(view, action)
}

pub(crate) fn exec_embedded_views_action(view: &ViewData, action: ViewAction) -> ViewResult<()> {
    let def = &view.def;
    if !def.node_flags.contains(NodeFlags::EMBEDDED_VIEWS) {
        return Ok(());
    }
    let mut i = 0;
    while i < def.nodes.len() {
        let node = &def.nodes[i];
        if node.flags.contains(NodeFlags::EMBEDDED_VIEWS) {
            for embedded in view.embedded_views(i) {
                call_view_action(&embedded, action)?;
            }
        } else if !node.child_flags.contains(NodeFlags::EMBEDDED_VIEWS) {
            i += node.child_count;
        }
        i += 1;
    }
    Ok(())
}

pub(crate) fn exec_component_views_action(view: &ViewData, action: ViewAction) -> ViewResult<()> {
    let def = &view.def;
    if !def.node_flags.contains(NodeFlags::COMPONENT_VIEW) {
        return Ok(());
    }
    let mut i = 0;
    while i < def.nodes.len() {
        let node = &def.nodes[i];
        if node.flags.contains(NodeFlags::COMPONENT_VIEW) {
            if let Some(component_view) = view.component_view(i) {
                call_view_action(&component_view, action)?;
            }
        } else if !node.child_flags.contains(NodeFlags::COMPONENT_VIEW) {
            i += node.child_count;
        }
        i += 1;
    }
    Ok(())
}

pub(crate) fn exec_queries_action(
    view: &ViewData,
    query_flags: NodeFlags,
    static_dynamic: NodeFlags,
    check_type: CheckType,
) -> ViewResult<()> {
    let def = &view.def;
    if !def.node_flags.intersects(query_flags) || !def.node_flags.intersects(static_dynamic) {
        return Ok(());
    }
    let mut i = 0;
    while i < def.nodes.len() {
        let node = &def.nodes[i];
        if node.flags.intersects(query_flags)
            && node.flags.intersects(static_dynamic)
            && check_type == CheckType::CheckAndUpdate
        {
            check_and_update_query(view, i)?;
        }
        if !node.child_flags.intersects(query_flags) || !node.child_flags.intersects(static_dynamic)
        {
            i += node.child_count;
        }
        i += 1;
    }
    Ok(())
}

/// Runs `lifecycles` on every provider of the view, children before the
/// element that declares them.
pub(crate) fn call_lifecycle_hooks_child_first(
    view: &ViewData,
    lifecycles: NodeFlags,
) -> ViewResult<()> {
    let def = &view.def;
    if !def.node_flags.intersects(lifecycles) {
        return Ok(());
    }
    let nodes = &def.nodes;
    let mut init_index = 0;
    let mut i = 0;
    while i < nodes.len() {
        let node = &nodes[i];
        let mut parent = node.parent;
        if parent.is_none() && node.flags.intersects(lifecycles) {
            call_provider_lifecycles(view, i, node.flags & lifecycles, init_index)?;
            init_index += 1;
        }
        if !node.child_flags.intersects(lifecycles) {
            i += node.child_count;
        }
        while let Some(p) = parent {
            let parent_def = &nodes[p];
            if !parent_def.flags.contains(NodeFlags::TYPE_ELEMENT)
                || i != p + parent_def.child_count
            {
                break;
            }
            if parent_def.direct_child_flags.intersects(lifecycles) {
                init_index = call_element_providers_lifecycles(view, parent_def, lifecycles, init_index)?;
            }
            parent = parent_def.parent;
        }
        i += 1;
    }
    Ok(())
}

fn call_element_providers_lifecycles(
    view: &ViewData,
    element: &NodeDef,
    lifecycles: NodeFlags,
    mut init_index: usize,
) -> ViewResult<usize> {
    let nodes = &view.def.nodes;
    let mut i = element.node_index + 1;
    while i <= element.node_index + element.child_count {
        let node = &nodes[i];
        if node.flags.intersects(lifecycles) {
            call_provider_lifecycles(view, i, node.flags & lifecycles, init_index)?;
            init_index += 1;
        }
        i += node.child_count + 1;
    }
    Ok(init_index)
}

fn call_provider_lifecycles(
    view: &ViewData,
    index: usize,
    lifecycles: NodeFlags,
    init_index: usize,
) -> ViewResult<()> {
    match view.provider(index) {
        Some(ProviderInstance::Directive(directive)) => {
            let mut hooks = directive.hooks()?;
            if lifecycles.contains(NodeFlags::AFTER_CONTENT_INIT)
                && should_call_lifecycle_init_hook(
                    view,
                    InitState::CallingAfterContentInit,
                    init_index,
                )
            {
                hooks.after_content_init()?;
            }
            if lifecycles.contains(NodeFlags::AFTER_CONTENT_CHECKED) {
                hooks.after_content_checked()?;
            }
            if lifecycles.contains(NodeFlags::AFTER_VIEW_INIT)
                && should_call_lifecycle_init_hook(view, InitState::CallingAfterViewInit, init_index)
            {
                hooks.after_view_init()?;
            }
            if lifecycles.contains(NodeFlags::AFTER_VIEW_CHECKED) {
                hooks.after_view_checked()?;
            }
            if lifecycles.contains(NodeFlags::ON_DESTROY) {
                hooks.on_destroy()?;
            }
            Ok(())
        }
        Some(ProviderInstance::Pipe(pipe)) if lifecycles.contains(NodeFlags::ON_DESTROY) => {
            pipe.destroy()
        }
        _ => Ok(()),
    }
}

fn check_and_update_node(view: &ViewData, node: &NodeDef, values: &[Value]) -> ViewResult<bool> {
    match &node.kind {
        NodeKind::Element(_) => check_and_update_element(view, node, values),
        NodeKind::Text { prefix } => check_and_update_text(view, node, prefix, values),
        NodeKind::Provider(_) if node.flags.contains(NodeFlags::TYPE_DIRECTIVE) => {
            check_and_update_directive(view, node, values)
        }
        NodeKind::PureExpression(kind) => check_and_update_pure(view, node, kind, values),
        _ => Ok(false),
    }
}

/// Records `value` as the binding's last value when it changed. The first
/// check always counts as a change.
pub(crate) fn check_and_update_binding(
    view: &ViewData,
    node: &NodeDef,
    binding: usize,
    value: &Value,
) -> bool {
    if check_binding(view, node, binding, value) {
        view.set_old_value(node.binding_index + binding, value.clone());
        true
    } else {
        false
    }
}

fn check_binding(view: &ViewData, node: &NodeDef, binding: usize, value: &Value) -> bool {
    view.has_state(ViewState::FIRST_CHECK)
        || !view
            .old_value(node.binding_index + binding)
            .loose_identical(value)
}

fn check_binding_no_changes(
    view: &ViewData,
    node: &NodeDef,
    binding: usize,
    value: &Value,
) -> ViewResult<()> {
    let old = view.old_value(node.binding_index + binding);
    let before_first_check = view.has_state(ViewState::BEFORE_FIRST_CHECK);
    if before_first_check || !old.dev_mode_equal(value) {
        let name = &node.bindings[binding].non_minified_name;
        return Err(ViewError::ExpressionChanged {
            previous: format!("{name}: {old}"),
            current: format!("{name}: {value}"),
            first_check: before_first_check,
        });
    }
    Ok(())
}

fn check_no_changes_node(view: &ViewData, node: &NodeDef, values: &[Value]) -> ViewResult<()> {
    for (i, value) in values.iter().enumerate() {
        check_binding_no_changes(view, node, i, value)?;
    }
    Ok(())
}

fn check_and_update_element(view: &ViewData, node: &NodeDef, values: &[Value]) -> ViewResult<bool> {
    let element = view.element(node.node_index)?;
    let mut changed = false;
    for (i, value) in values.iter().enumerate() {
        if check_and_update_binding(view, node, i, value) {
            changed = true;
            set_element_binding(view, &node.bindings[i], element.render_element, value);
        }
    }
    Ok(changed)
}

fn sanitize(view: &ViewData, binding: &BindingDef, value: &Value) -> Value {
    if binding.security_context == SecurityContext::None {
        value.clone()
    } else {
        view.root
            .env
            .sanitizer
            .sanitize(binding.security_context, value)
    }
}

fn set_element_binding(view: &ViewData, binding: &BindingDef, el: RNode, value: &Value) {
    let renderer = &view.renderer;
    let ns = binding.ns.as_deref();
    match binding.kind {
        BindingKind::Attribute => {
            let value = sanitize(view, binding, value);
            if value.is_null() {
                renderer.remove_attribute(el, &binding.name, ns);
            } else {
                renderer.set_attribute(el, &binding.name, &value.render_string(), ns);
            }
        }
        BindingKind::Class => {
            if value.is_truthy() {
                renderer.add_class(el, &binding.name);
            } else {
                renderer.remove_class(el, &binding.name);
            }
        }
        BindingKind::Style => {
            let value = sanitize(view, binding, value);
            if value.is_null() {
                renderer.remove_style(el, &binding.name);
            } else {
                let mut style = value.render_string();
                if let Some(unit) = &binding.suffix {
                    style.push_str(unit);
                }
                renderer.set_style(el, &binding.name, &style);
            }
        }
        BindingKind::Property => {
            let value = sanitize(view, binding, value);
            renderer.set_property(el, &binding.name, &value);
        }
        BindingKind::Input | BindingKind::Interpolation | BindingKind::Argument => {}
    }
}

fn check_and_update_text(
    view: &ViewData,
    node: &NodeDef,
    prefix: &str,
    values: &[Value],
) -> ViewResult<bool> {
    let mut changed = false;
    for (i, value) in values.iter().enumerate() {
        if check_and_update_binding(view, node, i, value) {
            changed = true;
        }
    }
    if changed {
        let mut text = prefix.to_string();
        for (value, binding) in values.iter().zip(&node.bindings) {
            text.push_str(&value.render_string());
            if let Some(suffix) = &binding.suffix {
                text.push_str(suffix);
            }
        }
        if let NodeData::Text(rnode) = view.node(node.node_index) {
            view.renderer.set_value(rnode, &text);
        }
    }
    Ok(changed)
}

pub(crate) fn check_and_update_directive(
    view: &ViewData,
    node: &NodeDef,
    values: &[Value],
) -> ViewResult<bool> {
    let Some(directive) = view.directive(node.node_index) else {
        return Ok(false);
    };
    let mut changed = false;
    let mut changes: Option<SimpleChanges> = None;
    for (i, value) in values.iter().enumerate() {
        if check_binding(view, node, i, value) {
            changed = true;
            update_prop(view, &directive, node, i, value, &mut changes)?;
        }
    }
    let mut hooks = directive.hooks()?;
    if let Some(changes) = changes {
        hooks.on_changes(&changes)?;
    }
    if node.flags.contains(NodeFlags::ON_INIT)
        && should_call_lifecycle_init_hook(view, InitState::CallingOnInit, node.node_index)
    {
        hooks.on_init()?;
    }
    if node.flags.contains(NodeFlags::DO_CHECK) {
        hooks.do_check()?;
    }
    Ok(changed)
}

fn update_prop(
    view: &ViewData,
    directive: &DirectiveInstance,
    node: &NodeDef,
    binding: usize,
    value: &Value,
    changes: &mut Option<SimpleChanges>,
) -> ViewResult<()> {
    if node.flags.contains(NodeFlags::COMPONENT) {
        if let Some(component_view) = node.parent.and_then(|p| view.component_view(p)) {
            if component_view.def.is_on_push() {
                component_view.set_state(ViewState::CHECKS_ENABLED);
            }
        }
    }
    let binding_def = &node.bindings[binding];
    directive
        .hooks()?
        .set_input(&binding_def.name, value.clone());
    let slot = node.binding_index + binding;
    if node.flags.contains(NodeFlags::ON_CHANGES) {
        changes.get_or_insert_with(HashMap::default).insert(
            binding_def.non_minified_name.clone(),
            SimpleChange {
                previous_value: view.old_value(slot),
                current_value: value.clone(),
                first_change: view.has_state(ViewState::FIRST_CHECK),
            },
        );
    }
    view.set_old_value(slot, value.clone());
    Ok(())
}

fn check_and_update_pure(
    view: &ViewData,
    node: &NodeDef,
    kind: &PureKind,
    values: &[Value],
) -> ViewResult<bool> {
    let mut changed = false;
    for (i, value) in values.iter().enumerate() {
        if check_and_update_binding(view, node, i, value) {
            changed = true;
        }
    }
    if changed {
        let value = match kind {
            PureKind::Array => Value::list(values.iter().cloned()),
            PureKind::Object(keys) => Value::map(
                keys.iter()
                    .cloned()
                    .zip(values.iter().cloned()),
            ),
            PureKind::Pipe { pipe_node } => match view.provider(*pipe_node) {
                Some(ProviderInstance::Pipe(pipe)) => pipe.transform(values)?,
                _ => {
                    return Err(ViewError::illegal_state(format!(
                        "pure pipe at {} references a pipe that was not created",
                        node.node_index
                    )))
                }
            },
        };
        view.set_node(node.node_index, NodeData::Pure(value));
    }
    Ok(changed)
}
