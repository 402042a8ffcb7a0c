use super::ChatMessage;
use crate::components::google_calendar::time::render_event_time;
use crate::components::google_calendar::CalendarEvent;
use chrono_tz::Tz;

/// Persona for the holistic multi-event overview
pub const OVERVIEW_PERSONA: &str = "You are a polished executive assistant. \
Summarize the person's upcoming calendar events in warm, professional paragraph form, \
mentioning each event's title and when it happens. \
Mention an event's description only when it adds meaningful information; \
omit it when it is empty, generic or repeats the title.";

/// Persona for a single event
pub const EVENT_PERSONA: &str = "You are a concise executive assistant. \
Summarize the calendar event below in one or two short sentences. \
Leave out the description if it adds nothing meaningful.";

/// Shown in place of an empty description
const NO_DESCRIPTION: &str = "(none)";

/// Sampling temperature used for both personas
pub const SUMMARY_TEMPERATURE: f32 = 0.7;

fn description_line(event: &CalendarEvent) -> &str {
    if event.has_description() {
        event.description.trim()
    } else {
        NO_DESCRIPTION
    }
}

/// Render events as a numbered list
pub fn format_events(events: &[CalendarEvent], tz: Tz) -> String {
    events
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "{}. Title: {}\n   Description: {}\n   Time: {}",
                i + 1,
                e.title,
                description_line(e),
                render_event_time(&e.time, tz)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages for one holistic summary covering every event
pub fn overview_messages(events: &[CalendarEvent], tz: Tz) -> Vec<ChatMessage> {
    let user_prompt = if events.is_empty() {
        "There are no upcoming events on this calendar. \
Say so briefly and note that the schedule is open."
            .to_string()
    } else {
        format!(
            "Here are some upcoming events:\n{}\n\nGive me a short overview as if you're summarizing this person's week.",
            format_events(events, tz)
        )
    };

    vec![
        ChatMessage::system(OVERVIEW_PERSONA),
        ChatMessage::user(user_prompt),
    ]
}

/// Messages for a terse single-event summary
pub fn event_messages(event: &CalendarEvent, tz: Tz) -> Vec<ChatMessage> {
    let user_prompt = format!(
        "Title: {}\nDescription: {}\nTime: {}",
        event.title,
        description_line(event),
        render_event_time(&event.time, tz)
    );

    vec![
        ChatMessage::system(EVENT_PERSONA),
        ChatMessage::user(user_prompt),
    ]
}
