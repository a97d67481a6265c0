pub mod auth;
pub mod feedback;
pub mod pages;
pub mod router;
pub mod session;
pub mod state;
pub mod templates;
pub mod translation;
pub mod uploads;

pub use state::AppState;
