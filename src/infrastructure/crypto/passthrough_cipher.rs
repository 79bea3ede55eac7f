use async_trait::async_trait;

use crate::application::ports::{CipherError, FieldCipher};

/// Stores fields as plaintext. Stands in where no key management service is wired.
pub struct PassthroughCipher;

#[async_trait]
impl FieldCipher for PassthroughCipher {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        Ok(plaintext.to_string())
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        Ok(ciphertext.to_string())
    }
}
