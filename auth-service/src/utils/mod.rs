pub mod password;
pub mod token;
pub mod validation;

pub use password::{Argon2Hasher, CredentialHasher, Password, PasswordHashString};
pub use token::{generate_secure_token, hash_token};
pub use validation::ValidatedJson;
