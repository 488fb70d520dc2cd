//! Configuration for the coalesce layer.

use crate::events::CoalesceEvent;
use alpamon_core::events::{EventListeners, FnListener};
use std::marker::PhantomData;

/// Configuration for the coalesce layer.
pub struct CoalesceConfig<K, F> {
    /// Function to extract a key from a request.
    pub(crate) key_extractor: F,
    /// Name identifying this instance in emitted events.
    pub(crate) name: String,
    /// Listeners notified of leader/waiter decisions.
    pub(crate) event_listeners: EventListeners<CoalesceEvent>,
    /// Marker for the key type.
    pub(crate) _key: PhantomData<K>,
}

impl<K, F> CoalesceConfig<K, F> {
    /// Create a new configuration with the given key extractor.
    pub fn new(key_extractor: F) -> Self {
        Self {
            key_extractor,
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
            _key: PhantomData,
        }
    }

    /// Create a builder for more configuration options.
    pub fn builder(key_extractor: F) -> CoalesceConfigBuilder<K, F> {
        CoalesceConfigBuilder::new(key_extractor)
    }
}

/// Builder for coalesce configuration.
pub struct CoalesceConfigBuilder<K, F> {
    key_extractor: F,
    name: String,
    event_listeners: EventListeners<CoalesceEvent>,
    _key: PhantomData<K>,
}

impl<K, F> CoalesceConfigBuilder<K, F> {
    /// Create a new builder with the given key extractor.
    pub fn new(key_extractor: F) -> Self {
        Self {
            key_extractor,
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
            _key: PhantomData,
        }
    }

    /// Set a name for this coalesce instance, carried on every
    /// [`CoalesceEvent`] it emits.
    ///
    /// # Example
    ///
    /// ```rust
    /// use alpamon_coalesce::CoalesceConfig;
    ///
    /// let config: CoalesceConfig<String, _> = CoalesceConfig::builder(|req: &String| req.clone())
    ///     .name("inventory-reconcile")
    ///     .build();
    /// ```
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a listener notified on every leader/waiter decision.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: alpamon_core::events::EventListener<CoalesceEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a plain function as a listener.
    pub fn on_event_fn<EF>(self, f: EF) -> Self
    where
        EF: Fn(&CoalesceEvent) + Send + Sync + 'static,
    {
        self.on_event(FnListener::new(f))
    }

    /// Build the configuration.
    pub fn build(self) -> CoalesceConfig<K, F> {
        CoalesceConfig {
            key_extractor: self.key_extractor,
            name: self.name,
            event_listeners: self.event_listeners,
            _key: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_config_builder() {
        let config: CoalesceConfig<String, _> = CoalesceConfig::builder(|req: &String| req.clone())
            .name("test")
            .build();

        assert_eq!(config.name, "test");
    }

    #[test]
    fn test_config_new() {
        let config: CoalesceConfig<String, _> = CoalesceConfig::new(|req: &String| req.clone());
        assert_eq!(config.name, "<unnamed>");
    }

    #[test]
    fn registered_listener_receives_events() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let config: CoalesceConfig<String, _> = CoalesceConfig::builder(|req: &String| req.clone())
            .on_event_fn(move |_event| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        config.event_listeners.emit(&CoalesceEvent::Leading {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
