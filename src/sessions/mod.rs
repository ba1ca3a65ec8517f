pub mod api;
pub mod events;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod store;

pub use events::{CreditsUpdate, EventHub, SessionEvent, SessionUpdate};
pub use models::{
    ActiveSession, AdvisorId, Availability, SessionStatus, StatusSnapshot, UserId, Wallet,
};
pub use scheduler::{process_tick, spawn as spawn_scheduler};
pub use service::{SessionService, NO_CREDITS_MESSAGE};
pub use store::{MeterStore, UserAccount};
