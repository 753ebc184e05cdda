//! A toy event type exercising the session core end to end: several
//! variants (to exercise sub-event narrowing, §4.9) keyed by a user id
//! (to exercise rule-based partitioning).

use std::sync::Arc;

use sessionkit_core::di::{DiError, TryFromEvent};
use sessionkit_core::rule::Rule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoEvent {
    Text { user: u32, body: String },
    Command { user: u32, name: String },
    Notice { user: u32, text: String },
}

impl DemoEvent {
    pub fn user(&self) -> u32 {
        match self {
            DemoEvent::Text { user, .. } => *user,
            DemoEvent::Command { user, .. } => *user,
            DemoEvent::Notice { user, .. } => *user,
        }
    }
}

/// Partitions sessions by user id, matching the spec's canonical example
/// rule ("same user continues the same conversation").
pub struct SameUser;

impl Rule<DemoEvent> for SameUser {
    async fn compare(&self, existing: &DemoEvent, incoming: &DemoEvent) -> bool {
        existing.user() == incoming.user()
    }
}

pub fn same_user_rule() -> Arc<dyn sessionkit_core::rule::ErasedRule<DemoEvent>> {
    Arc::new(SameUser)
}

/// Narrows a [`DemoEvent`] to just its text-command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCommand {
    pub user: u32,
    pub name: String,
}

impl TryFromEvent<DemoEvent> for TextCommand {
    const HINT: &'static str = "TextCommand";

    fn try_from_event(event: &DemoEvent) -> Result<Self, ()> {
        match event {
            DemoEvent::Command { user, name } => {
                Ok(TextCommand { user: *user, name: name.clone() })
            }
            _ => Err(()),
        }
    }
}

pub fn narrow_to_command(event: &DemoEvent, func_name: &str) -> Result<TextCommand, DiError> {
    sessionkit_core::di::try_from_event::narrow(event, func_name, "event", "DemoEvent")
}
