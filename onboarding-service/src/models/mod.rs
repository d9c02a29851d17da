pub mod application;
pub mod principal;

pub use application::{Application, ApplicationRow, ApplicationStatus};
pub use principal::Principal;
