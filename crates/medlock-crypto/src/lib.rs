pub mod aes_gcm;
pub mod digest;
pub mod error;
pub mod keys;
pub mod types;

pub use aes_gcm::{decrypt, encrypt, EncryptionContext};
pub use digest::{digest, verify};
pub use error::CryptoError;
pub use keys::generate_key;
pub use types::{
    KeyMaterial, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, CURRENT_VERSION,
    DIGEST_LENGTH, SUPPORTED_VERSIONS,
};
