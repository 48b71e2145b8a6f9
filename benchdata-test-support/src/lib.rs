//! Shared test utilities used across benchdata crates.

pub mod recording {
    //! A `tracing` layer that captures events and closed spans for assertions.

    use std::{
        collections::BTreeMap,
        fmt,
        sync::{Arc, Mutex, PoisonError},
    };

    use tracing::{
        Event, Level, Subscriber,
        field::{Field, Visit},
        span,
    };
    use tracing_subscriber::{Layer, Registry, layer::Context, prelude::*, registry::LookupSpan};

    /// Captures every event and closed span observed while installed.
    ///
    /// Clones share storage, so a clone can be installed in a subscriber while
    /// the original is kept for assertions.
    #[derive(Clone, Debug, Default)]
    pub struct RecordingLayer {
        events: Arc<Mutex<Vec<EventRecord>>>,
        spans: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingLayer {
        /// Returns the recorded events in emission order.
        ///
        /// # Examples
        /// ```
        /// use benchdata_test_support::recording::RecordingLayer;
        ///
        /// assert!(RecordingLayer::default().events().is_empty());
        /// ```
        #[must_use]
        pub fn events(&self) -> Vec<EventRecord> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Returns the recorded events whose message equals `message`.
        #[must_use]
        pub fn events_with_message(&self, message: &str) -> Vec<EventRecord> {
            self.events()
                .into_iter()
                .filter(|event| event.message == message)
                .collect()
        }

        /// Returns the names of closed spans in completion order.
        #[must_use]
        pub fn span_names(&self) -> Vec<String> {
            self.spans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    /// Snapshot of one emitted event.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct EventRecord {
        /// Event level.
        pub level: Level,
        /// Event target, usually the emitting module path.
        pub target: String,
        /// The formatted `message` field, empty when absent.
        pub message: String,
        /// Every other field, formatted.
        pub fields: BTreeMap<String, String>,
        /// Names of the spans enclosing the event, outermost first.
        pub scope: Vec<String>,
    }

    impl EventRecord {
        /// Returns the formatted value of `name`, if recorded.
        #[must_use]
        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields.get(name).map(String::as_str)
        }
    }

    /// Runs `f` with a fresh [`RecordingLayer`] as the thread's default
    /// subscriber and returns its result together with the layer.
    ///
    /// # Examples
    /// ```
    /// use benchdata_test_support::recording::with_recording;
    ///
    /// let ((), layer) = with_recording(|| tracing::info!(rows = 3, "done"));
    /// let events = layer.events_with_message("done");
    /// assert_eq!(events.len(), 1);
    /// assert_eq!(events[0].field("rows"), Some("3"));
    /// ```
    pub fn with_recording<T>(f: impl FnOnce() -> T) -> (T, RecordingLayer) {
        let layer = RecordingLayer::default();
        let subscriber = Registry::default().with(layer.clone());
        let value = tracing::subscriber::with_default(subscriber, f);
        (value, layer)
    }

    impl<S> Layer<S> for RecordingLayer
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
            let Some(closed) = ctx.span(&id) else {
                return;
            };
            self.spans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(closed.name().to_owned());
        }

        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);
            let scope = ctx
                .event_scope(event)
                .map(|spans| {
                    spans
                        .from_root()
                        .map(|entered| entered.name().to_owned())
                        .collect()
                })
                .unwrap_or_default();
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(EventRecord {
                    level: *event.metadata().level(),
                    target: event.metadata().target().to_owned(),
                    message: visitor.message,
                    fields: visitor.fields,
                    scope,
                });
        }
    }

    #[derive(Default)]
    struct FieldVisitor {
        message: String,
        fields: BTreeMap<String, String>,
    }

    impl FieldVisitor {
        fn insert(&mut self, field: &Field, value: String) {
            if field.name() == "message" {
                self.message = value;
            } else {
                self.fields.insert(field.name().to_owned(), value);
            }
        }
    }

    impl Visit for FieldVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.insert(field, format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.insert(field, value.to_owned());
        }

        fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
            self.insert(field, value.to_string());
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.insert(field, value.to_string());
        }

        fn record_i64(&mut self, field: &Field, value: i64) {
            self.insert(field, value.to_string());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.insert(field, value.to_string());
        }

        fn record_f64(&mut self, field: &Field, value: f64) {
            self.insert(field, value.to_string());
        }
    }

}
