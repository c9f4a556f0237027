use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::value::Value;

/// Model lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Creating,
    Created,
    Updating,
    Updated,
    Saving,
    Saved,
    Deleting,
    Deleted,
    Restoring,
    Restored,
    Retrieved,
}

impl ModelEvent {
    pub const ALL: [ModelEvent; 11] = [
        ModelEvent::Creating,
        ModelEvent::Created,
        ModelEvent::Updating,
        ModelEvent::Updated,
        ModelEvent::Saving,
        ModelEvent::Saved,
        ModelEvent::Deleting,
        ModelEvent::Deleted,
        ModelEvent::Restoring,
        ModelEvent::Restored,
        ModelEvent::Retrieved,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelEvent::Creating => "creating",
            ModelEvent::Created => "created",
            ModelEvent::Updating => "updating",
            ModelEvent::Updated => "updated",
            ModelEvent::Saving => "saving",
            ModelEvent::Saved => "saved",
            ModelEvent::Deleting => "deleting",
            ModelEvent::Deleted => "deleted",
            ModelEvent::Restoring => "restoring",
            ModelEvent::Restored => "restored",
            ModelEvent::Retrieved => "retrieved",
        }
    }

    /// `*ing` events fire before the statement runs and can be cancelled
    pub fn is_pre(&self) -> bool {
        matches!(
            self,
            ModelEvent::Creating
                | ModelEvent::Updating
                | ModelEvent::Saving
                | ModelEvent::Deleting
                | ModelEvent::Restoring
        )
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelEvent::ALL
            .iter()
            .copied()
            .find(|event| event.name() == s)
            .ok_or_else(|| format!("Unknown model event: {}", s))
    }
}

/// Payload shared by every handler of one emitted event
#[derive(Debug)]
pub struct EventContext<'a, M> {
    pub event: ModelEvent,
    pub model_name: &'static str,
    /// The record being written or just read, when there is one
    pub record: Option<&'a M>,
    /// Primary key the operation targets, when known
    pub key: Option<&'a Value>,
    cancelled: bool,
}

impl<'a, M> EventContext<'a, M> {
    pub fn new(event: ModelEvent, model_name: &'static str) -> Self {
        Self {
            event,
            model_name,
            record: None,
            key: None,
            cancelled: false,
        }
    }

    pub fn with_record(mut self, record: &'a M) -> Self {
        self.record = Some(record);
        self
    }

    pub fn with_key(mut self, key: &'a Value) -> Self {
        self.key = Some(key);
        self
    }

    /// Abort the pending operation. Ignored on post events.
    pub fn cancel(&mut self) {
        if self.event.is_pre() {
            self.cancelled = true;
        } else {
            debug!(
                event = %self.event,
                model = self.model_name,
                "cancel() ignored on a post event"
            );
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
