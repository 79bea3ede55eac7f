mod passthrough_cipher;

pub use passthrough_cipher::PassthroughCipher;
