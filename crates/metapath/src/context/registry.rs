use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::trace;

use super::StaticContext;

/// Interns one [`StaticContext`] per base URI.
///
/// Created by the caller and passed by reference; lookups take the read lock,
/// insertion repeats the lookup under the write lock so concurrent callers
/// always observe the same instance.
#[derive(Debug, Default)]
pub struct StaticContextRegistry {
    contexts: RwLock<HashMap<String, Arc<StaticContext>>>,
}

impl StaticContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, base_uri: &str) -> Option<Arc<StaticContext>> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(base_uri)
            .cloned()
    }

    pub fn get_or_insert_with<F>(&self, base_uri: &str, create: F) -> Arc<StaticContext>
    where
        F: FnOnce() -> StaticContext,
    {
        if let Some(existing) = self.get(base_uri) {
            return existing;
        }
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(contexts.entry(base_uri.to_string()).or_insert_with(|| {
            trace!("registering static context for {base_uri}");
            Arc::new(create())
        }))
    }

    pub fn len(&self) -> usize {
        self.contexts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every interned context.
    pub fn clear(&self) {
        self.contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_or_insert_is_idempotent() {
        let registry = StaticContextRegistry::new();
        let first = registry.get_or_insert_with("urn:a", || {
            StaticContext::builder().base_uri("urn:a").build()
        });
        let second = registry.get_or_insert_with("urn:a", StaticContext::default);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.base_uri(), Some("urn:a"));
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration_yields_one_instance() {
        let registry = StaticContextRegistry::new();
        let contexts: Vec<Arc<StaticContext>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.get_or_insert_with("urn:shared", StaticContext::default)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(contexts.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
