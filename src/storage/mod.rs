pub mod credentials;
pub mod feedback;

pub use credentials::{CredentialError, CredentialStore};
pub use feedback::{FeedbackError, FeedbackStore};
