//! HTTP handlers.

pub mod applications;
pub mod metrics;
pub mod session;

pub use applications::{approve_application, list_applications, register, revert_decision};
pub use session::{check_connection, login, protected};
