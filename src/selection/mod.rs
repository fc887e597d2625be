//! Selection state, its transitions, and the views derived from it.

pub mod orchestrator;
pub mod state;
pub mod view;

pub use orchestrator::{
    CitySuggestions, FetchOutcome, PersistOutcome, PersistTicket, PointFetch, SelectionOrchestrator,
};
pub use state::{FetchStatus, PersistStatus, SelectionPhase, SelectionState};
pub use view::SelectionView;
