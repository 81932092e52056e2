//! Show or hide an element depending on the caller's permissions.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use tracker_auth::{Authorizer, PermissionSet, Requirement, is_granted};

use crate::permission_cache::{PermissionCache, PermissionObserver};

/// The one piece of an element a binding touches: its inline `display`.
pub trait StyledElement: Send + 'static {
    /// `None` when no inline value is set.
    fn display(&self) -> Option<String>;

    fn set_display(&mut self, value: Option<&str>);
}

/// Plain in-memory element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub display: Option<String>,
}

impl InlineStyle {
    pub fn new(display: Option<&str>) -> Self {
        Self {
            display: display.map(str::to_string),
        }
    }
}

impl StyledElement for InlineStyle {
    fn display(&self) -> Option<String> {
        self.display.clone()
    }

    fn set_display(&mut self, value: Option<&str>) {
        self.display = value.map(str::to_string);
    }
}

#[derive(Debug)]
struct BindingState<E> {
    element: E,
    requirement: Requirement,
    /// Display value the element had before it was hidden.
    hidden_from: Option<Option<String>>,
}

impl<E: StyledElement> BindingState<E> {
    fn apply(&mut self, granted: bool) {
        match (granted, self.hidden_from.take()) {
            (true, Some(previous)) => self.element.set_display(previous.as_deref()),
            (true, None) => {}
            (false, Some(previous)) => self.hidden_from = Some(previous),
            (false, None) => {
                self.hidden_from = Some(self.element.display());
                self.element.set_display(Some("none"));
            }
        }
    }
}

/// Keeps one element's visibility in line with a requirement.
///
/// Re-evaluated on attach, on [`update`](Self::update) and whenever the
/// permission cache changes. Dropping the binding unsubscribes it.
#[derive(Debug)]
pub struct VisibilityBinding<E: StyledElement> {
    cache: Arc<PermissionCache>,
    state: Mutex<BindingState<E>>,
}

impl<E: StyledElement> VisibilityBinding<E> {
    pub fn attach(cache: &Arc<PermissionCache>, element: E, requirement: impl Into<Requirement>) -> Arc<Self> {
        let binding = Arc::new(Self {
            cache: cache.clone(),
            state: Mutex::new(BindingState {
                element,
                requirement: requirement.into(),
                hidden_from: None,
            }),
        });

        let observer: Weak<dyn PermissionObserver> = Arc::downgrade(&binding) as Weak<dyn PermissionObserver>;
        cache.subscribe(observer);
        binding.refresh();
        binding
    }

    /// Bind to a different requirement.
    pub fn update(&self, requirement: impl Into<Requirement>) {
        self.state.lock().requirement = requirement.into();
        self.refresh();
    }

    /// Re-check against the cache's current contents.
    pub fn refresh(&self) {
        let snapshot = self.cache.snapshot();
        self.evaluate(&snapshot);
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().hidden_from.is_none()
    }

    pub fn requirement(&self) -> Requirement {
        self.state.lock().requirement.clone()
    }

    pub fn with_element<R>(&self, f: impl FnOnce(&E) -> R) -> R {
        f(&self.state.lock().element)
    }

    fn evaluate<A: Authorizer + ?Sized>(&self, authz: &A) {
        let mut state = self.state.lock();
        let granted = is_granted(authz, &state.requirement);
        state.apply(granted);
    }
}

impl<E: StyledElement> PermissionObserver for VisibilityBinding<E> {
    fn permissions_changed(&self, permissions: &PermissionSet) {
        self.evaluate(permissions);
    }
}

/// A DOM element looked up by id on each access.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct DomElement {
    id: String,
}

#[cfg(target_arch = "wasm32")]
impl DomElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    fn style(&self) -> Option<web_sys::CssStyleDeclaration> {
        use wasm_bindgen::JsCast;

        let element = web_sys::window()?.document()?.get_element_by_id(&self.id)?;
        element.dyn_into::<web_sys::HtmlElement>().ok().map(|e| e.style())
    }
}

#[cfg(target_arch = "wasm32")]
impl StyledElement for DomElement {
    fn display(&self) -> Option<String> {
        self.style()
            .and_then(|s| s.get_property_value("display").ok())
            .filter(|v| !v.is_empty())
    }

    fn set_display(&mut self, value: Option<&str>) {
        let Some(style) = self.style() else {
            tracing::debug!(id = %self.id, "bound element is not in the document");
            return;
        };
        let result = match value {
            Some(v) => style.set_property("display", v),
            None => style.remove_property("display").map(|_| ()),
        };
        if let Err(err) = result {
            tracing::warn!(id = %self.id, error = ?err, "failed to update element display");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracker_api::InMemoryAuthApi;

    fn cache() -> Arc<PermissionCache> {
        Arc::new(PermissionCache::new(Arc::new(InMemoryAuthApi::new())))
    }

    #[test]
    fn hides_without_the_code_and_restores_the_exact_display() {
        let cache = cache();
        let binding = VisibilityBinding::attach(&cache, InlineStyle::new(Some("inline-flex")), "project:read");

        assert!(!binding.is_visible());
        assert_eq!(binding.with_element(|e| e.display()), Some("none".into()));

        cache.set_roles([tracker_auth::RoleName::ADMIN]);
        assert!(binding.is_visible());
        assert_eq!(binding.with_element(|e| e.display()), Some("inline-flex".into()));
    }

    #[test]
    fn unset_display_comes_back_unset() {
        let cache = cache();
        let binding = VisibilityBinding::attach(&cache, InlineStyle::default(), "user:write");
        assert_eq!(binding.with_element(|e| e.display()), Some("none".into()));

        binding.update(Requirement::any_of(Vec::<&'static str>::new()));
        assert!(!binding.is_visible());

        cache.set_roles(["admin"]);
        assert_eq!(binding.with_element(|e| e.display()), None);
    }

    #[test]
    fn repeated_denials_keep_the_original_value() {
        let cache = cache();
        cache.set_roles(["admin"]);
        let binding = VisibilityBinding::attach(&cache, InlineStyle::new(Some("block")), "bug:read");
        assert!(binding.is_visible());

        cache.clear();
        cache.set_roles(["qa"]);
        assert!(!binding.is_visible());

        cache.set_roles(["admin"]);
        assert_eq!(binding.with_element(|e| e.display()), Some("block".into()));
    }

    #[test]
    fn dropped_binding_stops_observing() {
        let cache = cache();
        let binding = VisibilityBinding::attach(&cache, InlineStyle::default(), "task:read");
        drop(binding);
        cache.set_roles(["admin"]);
        assert!(cache.has("task:read"));
    }
}
