use rand::{rngs::OsRng, Rng};

/// Alphabet for provisioned passwords: letters, digits and `!@#$%^&*()_+`.
pub const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+";

pub const GENERATED_PASSWORD_LENGTH: usize = 12;

/// Plaintext password; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(**redacted**)")
    }
}

/// Generates an initial account password drawn uniformly from
/// [`PASSWORD_CHARSET`] with the operating system CSPRNG.
pub fn generate_password() -> Password {
    generate_password_with(&mut OsRng, GENERATED_PASSWORD_LENGTH)
}

pub fn generate_password_with<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Password {
    let password = (0..length)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect();
    Password(password)
}
