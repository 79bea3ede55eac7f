use async_trait::async_trait;

/// Field-level encryption boundary used by persistence for sensitive columns.
#[async_trait]
pub trait FieldCipher: Send + Sync {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}
