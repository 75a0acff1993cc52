//! Security utilities for credential protection and catalog sealing.
//!
//! # Security Guarantees
//! - Credentials are stored in `Zeroizing` containers for automatic memory clearing
//! - Passwords are redacted from `Debug` output and never persisted
//! - Decrypted catalog bytes are held in zeroizing buffers
//!
//! # Module Structure
//! - `credentials`: datasource login container
//! - `bundle`: AES-128-CBC sealing of bundled catalog resources

pub mod bundle;
mod credentials;

pub use bundle::BundleCipher;
pub use credentials::Credentials;
