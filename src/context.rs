use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use knit_core::RawToken;

use crate::provider::Provider;

/// Local bindings layered over the ones of an enclosing resolution step.
///
/// Every resolution step gets its own context, so bindings added while building a value
/// are visible to that value's dependencies and never to its siblings.
#[derive(Debug, Default)]
pub struct ResolutionContext<'p> {
    parent: Option<&'p ResolutionContext<'p>>,
    local: RefCell<HashMap<RawToken, Arc<Provider>>>,
}

impl<'p> ResolutionContext<'p> {
    /// An empty context with no parent.
    pub fn root() -> Self {
        Self::default()
    }

    /// An empty context layered over `self`.
    pub fn child(&self) -> ResolutionContext<'_> {
        ResolutionContext {
            parent: Some(self),
            local: RefCell::default(),
        }
    }

    pub const fn parent(&self) -> Option<&'p ResolutionContext<'p>> {
        self.parent
    }

    /// Finds the provider of `token`, checking this context before its ancestors.
    pub fn lookup(&self, token: &RawToken) -> Option<Arc<Provider>> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(provider) = context.local.borrow().get(token) {
                return Some(Arc::clone(provider));
            }
            current = context.parent;
        }
        None
    }

    /// Binds `token` in this context only, replacing any earlier local binding.
    pub fn bind_local(&self, token: RawToken, provider: Provider) {
        self.local.borrow_mut().insert(token, Arc::new(provider));
    }

    /// Returns `true` if `token` is bound in this context, ignoring ancestors.
    pub fn is_bound_locally(&self, token: &RawToken) -> bool {
        self.local.borrow().contains_key(token)
    }
}
