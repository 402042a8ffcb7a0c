use serde::{Deserialize, Serialize};

/// Placeholder title for events without a summary
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Event as returned by the provider, before normalization
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderEvent {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_date_time: Option<String>,
    pub start_date: Option<String>,
}

/// Normalized calendar event handed to the workflow and the frontend
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time: String,
    /// Terse per-event summary, filled in after a regenerate call
    #[serde(
        rename = "regeneratedSummary",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub regenerated_summary: Option<String>,
}

impl CalendarEvent {
    /// Create an event from already-normalized parts
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            time: time.into(),
            regenerated_summary: None,
        }
    }

    /// Whether the description carries anything worth summarizing
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

impl From<&ProviderEvent> for CalendarEvent {
    fn from(event: &ProviderEvent) -> Self {
        let title = non_blank(event.summary.as_deref())
            .unwrap_or(UNTITLED_EVENT)
            .to_string();
        let description = non_blank(event.description.as_deref())
            .map(str::to_string)
            .unwrap_or_default();
        // Timed events take precedence over the all-day date
        let time = event
            .start_date_time
            .as_deref()
            .or(event.start_date.as_deref())
            .unwrap_or_default()
            .to_string();

        CalendarEvent::new(title, description, time)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Normalize provider events, preserving provider order
pub fn normalize_events(events: &[ProviderEvent]) -> Vec<CalendarEvent> {
    events.iter().map(CalendarEvent::from).collect()
}
