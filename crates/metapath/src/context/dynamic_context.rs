use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, Local};
use log::trace;
use metaschema_model::QName;

use crate::item::{Item, Sequence};

use super::StaticContext;

/// Memoization key for one function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallingContext<N> {
    function: QName,
    arity: usize,
    arguments: Vec<Sequence<N>>,
    context_item: Option<Item<N>>,
}

impl<N> CallingContext<N> {
    pub fn new(
        function: QName,
        arguments: Vec<Sequence<N>>,
        context_item: Option<Item<N>>,
    ) -> Self {
        Self {
            function,
            arity: arguments.len(),
            arguments,
            context_item,
        }
    }

    pub fn function(&self) -> &QName {
        &self.function
    }

    pub fn arguments(&self) -> &[Sequence<N>] {
        &self.arguments
    }

    pub fn context_item(&self) -> Option<&Item<N>> {
        self.context_item.as_ref()
    }
}

/// A `let`, `for` or parameter binding layered over its enclosing scope.
struct Binding<N> {
    name: QName,
    value: Sequence<N>,
    parent: Option<Arc<Binding<N>>>,
}

struct Shared<N> {
    variables: HashMap<QName, Sequence<N>>,
    cache: Option<Mutex<HashMap<CallingContext<N>, Sequence<N>>>>,
    current_date_time: DateTime<FixedOffset>,
}

/// Evaluation-time environment.
///
/// Clones are cheap and share the external variables, the clock and the
/// function-result cache. [`DynamicContext::bind_variable`] returns a child
/// context in which the new binding is visible; the parent is unaffected.
pub struct DynamicContext<N> {
    static_context: Arc<StaticContext>,
    scope: Option<Arc<Binding<N>>>,
    shared: Arc<Shared<N>>,
}

impl<N> Clone for DynamicContext<N> {
    fn clone(&self) -> Self {
        Self {
            static_context: Arc::clone(&self.static_context),
            scope: self.scope.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<N> fmt::Debug for DynamicContext<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContext")
            .field("static_context", &self.static_context)
            .field("current_date_time", &self.shared.current_date_time)
            .field("caching", &self.shared.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl<N: Clone + Eq + Hash> DynamicContext<N> {
    pub fn new(static_context: Arc<StaticContext>) -> Self {
        Self::builder(static_context).build()
    }

    pub fn builder(static_context: Arc<StaticContext>) -> DynamicContextBuilder<N> {
        DynamicContextBuilder {
            static_context,
            variables: HashMap::new(),
            implicit_timezone: None,
            current_date_time: None,
            cache: true,
        }
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_context
    }

    pub fn variable(&self, name: &QName) -> Option<&Sequence<N>> {
        let mut scope = self.scope.as_deref();
        while let Some(binding) = scope {
            if &binding.name == name {
                return Some(&binding.value);
            }
            scope = binding.parent.as_deref();
        }
        self.shared.variables.get(name)
    }

    pub fn bind_variable(&self, name: QName, value: Sequence<N>) -> Self {
        Self {
            static_context: Arc::clone(&self.static_context),
            scope: Some(Arc::new(Binding {
                name,
                value,
                parent: self.scope.clone(),
            })),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Fixed for the lifetime of the context.
    pub fn current_date_time(&self) -> DateTime<FixedOffset> {
        self.shared.current_date_time
    }

    pub fn implicit_timezone(&self) -> FixedOffset {
        *self.shared.current_date_time.offset()
    }

    pub fn cache_len(&self) -> usize {
        self.shared.cache.as_ref().map_or(0, |cache| {
            cache.lock().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    pub(crate) fn cached_result(&self, key: &CallingContext<N>) -> Option<Sequence<N>> {
        let cache = self.shared.cache.as_ref()?;
        let hit = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        trace!(
            "function cache {} for {}#{}",
            if hit.is_some() { "hit" } else { "miss" },
            key.function,
            key.arity
        );
        hit
    }

    pub(crate) fn cache_result(&self, key: CallingContext<N>, result: Sequence<N>) {
        if let Some(cache) = &self.shared.cache {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, result);
        }
    }
}

/// Builds a [`DynamicContext`].
pub struct DynamicContextBuilder<N> {
    static_context: Arc<StaticContext>,
    variables: HashMap<QName, Sequence<N>>,
    implicit_timezone: Option<FixedOffset>,
    current_date_time: Option<DateTime<FixedOffset>>,
    cache: bool,
}

impl<N: Clone + Eq + Hash> DynamicContextBuilder<N> {
    pub fn variable(mut self, name: QName, value: Sequence<N>) -> Self {
        self.variables.insert(name, value);
        self
    }

    pub fn implicit_timezone(mut self, offset: FixedOffset) -> Self {
        self.implicit_timezone = Some(offset);
        self
    }

    pub fn current_date_time(mut self, now: DateTime<FixedOffset>) -> Self {
        self.current_date_time = Some(now);
        self
    }

    /// Turns off memoization of function results.
    pub fn disable_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        let now = self
            .current_date_time
            .unwrap_or_else(|| Local::now().fixed_offset());
        let current_date_time = match self.implicit_timezone {
            Some(offset) => now.with_timezone(&offset),
            None => now,
        };
        DynamicContext {
            static_context: self.static_context,
            scope: None,
            shared: Arc::new(Shared {
                variables: self.variables,
                cache: self.cache.then(|| Mutex::new(HashMap::new())),
                current_date_time,
            }),
        }
    }
}
