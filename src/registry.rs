use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use knit_core::RawToken;

use crate::provider::Provider;

/// A thread-safe map from tokens to providers.
///
/// Binding a token that is already bound replaces its provider.
#[derive(Debug, Default)]
pub struct Registry {
    providers: RwLock<HashMap<RawToken, Arc<Provider>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `token` to `provider`, returning the provider it replaced, if any.
    pub fn bind(&self, token: RawToken, provider: Provider) -> Option<Arc<Provider>> {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        providers.insert(token, Arc::new(provider))
    }

    pub fn lookup(&self, token: &RawToken) -> Option<Arc<Provider>> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.get(token).cloned()
    }

    pub fn contains(&self, token: &RawToken) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use knit_core::{Token, TypeKey};

    use super::*;

    fn value_of(provider: &Provider) -> Option<u32> {
        match provider {
            Provider::Value(value) => value.clone().downcast::<u32>().ok().map(|v| *v),
            _ => None,
        }
    }

    #[test]
    fn test_last_bind_wins() {
        let registry = Registry::new();
        let token = RawToken::by_type(TypeKey::of::<u32>());
        assert!(registry.is_empty());

        assert!(registry.bind(token.clone(), Provider::value(1u32)).is_none());
        let replaced = registry.bind(token.clone(), Provider::value(2u32)).unwrap();
        assert_eq!(value_of(&replaced), Some(1));

        let provider = registry.lookup(&token).unwrap();
        assert_eq!(value_of(&provider), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identity_tokens_are_distinct() {
        let registry = Registry::new();
        let first = Token::<u32>::new("port");
        let second = Token::<u32>::new("port");

        registry.bind(first.raw().clone(), Provider::value(80u32));
        assert!(registry.contains(first.raw()));
        assert!(!registry.contains(second.raw()));
        assert!(!registry.contains(Token::<u32>::by_type().raw()));
    }
}
