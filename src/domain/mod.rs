pub mod dictionary;
pub mod locale;
pub mod message;
pub mod payload;
pub mod recipient;
pub mod search;
pub mod sender;
pub mod template;
pub mod user;
pub mod variable;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base64 envelope produced by a [`ContentCipher`](crate::services::crypto_service::ContentCipher).
///
/// Keeps ciphertext from being confused with plaintext at the type level.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Encrypted(String);

impl Encrypted {
    #[must_use]
    pub const fn new(envelope: String) -> Self {
        Self(envelope)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Encrypted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Encrypted(..)")
    }
}
