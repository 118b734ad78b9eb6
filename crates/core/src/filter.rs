use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{error::ParseError, types::Event};

/// Parse one archive line. Anything other than a JSON object is rejected.
pub fn parse_event(line: &str) -> Result<Event, ParseError> {
    serde_json::from_str::<Map<String, Value>>(line)
        .map(Event::from_map)
        .map_err(|source| ParseError::new(line, source))
}

/// Exact, case-sensitive match on the event's `type`
#[derive(Debug, Clone)]
pub struct EventFilter {
    accepted: HashSet<String>,
}

impl EventFilter {
    pub fn new<I, S>(accepted_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: accepted_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, event: &Event) -> bool {
        event
            .event_type()
            .is_some_and(|kind| self.accepted.contains(kind))
    }
}
