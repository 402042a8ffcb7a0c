// Export components
pub mod google_calendar;
pub mod llm;
pub mod session_store;
pub mod similarity_store;
pub mod workflow;

// Re-export the workflow entry points
pub use workflow::{CalendarDigest, SummaryWorkflow, WorkflowOptions};
