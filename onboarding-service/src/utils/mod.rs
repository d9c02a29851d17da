pub mod password;
pub mod validation;

pub use password::{generate_password, Password};
pub use validation::ValidatedJson;
