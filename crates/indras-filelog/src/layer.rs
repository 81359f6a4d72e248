//! Tracing integration
//!
//! [`FileLogLayer`] forwards `tracing` events into a [`Logger`], so an
//! application can keep using `tracing::info!` and friends while the lines
//! land in the rotating file layout.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::level::Level;
use crate::logger::Logger;

/// Layer that writes tracing events through a [`Logger`]
///
/// Events emitted by this crate itself are skipped, since the writer thread
/// reports its own I/O failures through `tracing` and must never feed them
/// back into its own queue.
pub struct FileLogLayer {
    logger: Arc<Logger>,
    include_target: bool,
}

impl FileLogLayer {
    /// Create a layer writing to `logger`
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            include_target: false,
        }
    }

    /// Prefix each message with the event target
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.include_target = enabled;
        self
    }
}

/// Collects the `message` field and appends the rest as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S> Layer<S> for FileLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) {
            return;
        }

        let level = Level::from(metadata.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut text = String::new();
        if self.include_target {
            let _ = write!(text, "{}: ", metadata.target());
        }
        text.push_str(&visitor.message);
        text.push_str(&visitor.fields);

        self.logger.log(level, text);
    }
}

/// Events emitted by this crate would feed back into the logger
fn is_own_target(target: &str) -> bool {
    let own = env!("CARGO_CRATE_NAME");
    target == own
        || target
            .strip_prefix(own)
            .is_some_and(|rest| rest.starts_with("::"))
}
