use std::fmt::Debug;
use tracing::{
    Event, Metadata,
    field::{Field, Visit},
};
use tracing_subscriber::{
    EnvFilter, Layer,
    layer::{Context, Filter, SubscriberExt},
    util::SubscriberInitExt,
};

const DEFAULT_DIRECTIVES: &str = "simpleblog_api=debug,\
    simpleblog_db=debug,\
    simpleblog_common=debug,\
    tower_http=debug,axum::rejection=trace,sqlx=warn";

/// Drops events whose message contains any of the configured fragments.
///
/// Attached to a single layer, so other layers still see those events.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SuppressMessages {
    fragments: Vec<String>,
}

impl SuppressMessages {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments
            .into_iter()
            .map(Into::into)
            .filter(|fragment: &String| !fragment.is_empty())
            .collect();

        Self { fragments }
    }

    /// Parses a comma separated list, ignoring blank entries.
    #[must_use]
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim))
    }

    #[must_use]
    pub fn suppresses(&self, message: &str) -> bool {
        self.fragments
            .iter()
            .any(|fragment| message.contains(fragment.as_str()))
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

impl<S> Filter<S> for SuppressMessages {
    fn enabled(&self, _metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        if self.fragments.is_empty() {
            return true;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        !visitor
            .message
            .is_some_and(|message| self.suppresses(&message))
    }
}

pub fn install_tracing(suppress: SuppressMessages) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()))
        .with(tracing_subscriber::fmt::layer().with_filter(suppress))
        .init();
}

#[cfg(test)]
mod tests {
    use crate::logging::SuppressMessages;
    use std::{
        io::Write,
        sync::{Arc, Mutex, PoisonError},
    };
    use tracing::{info, warn};
    use tracing_subscriber::{Layer, layer::SubscriberExt};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fragments_are_parsed_from_a_list() {
        let suppress = SuppressMessages::from_list(
            "`headers()` should be awaited before using its value, ,sync-dynamic-apis",
        );

        assert!(suppress.suppresses(
            "Route \"/api/auth/[...nextauth]\" used `headers()`. \
             `headers()` should be awaited before using its value."
        ));
        assert!(!suppress.suppresses("headers() should be awaited"));
        assert!(suppress.suppresses("see sync-dynamic-apis"));
        assert!(!suppress.suppresses("database unreachable"));
        assert_eq!(SuppressMessages::from_list(" , "), SuppressMessages::default());
    }

    #[test]
    fn matching_events_are_dropped() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .with_filter(SuppressMessages::new(["noisy warning"])),
        );

        tracing::subscriber::with_default(subscriber, || {
            warn!("a noisy warning from a dependency");
            info!(user = 1, "kept message");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(!output.contains("noisy warning"));
        assert!(output.contains("kept message"));
    }
}
