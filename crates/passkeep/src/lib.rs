//! passkeep - Local credential store
//!
//! "One command per account, one strong password per service."
//!
//! Ask for a service and get its password back. If the service is new, a
//! 16-character password is generated with the operating system's CSPRNG
//! and stored. Everything lives in one plaintext file, one
//! `<service>:<password>` record per line.

pub mod config;
pub mod generator;
pub mod store;

pub use config::Config;
pub use generator::{generate_password, ALPHABET, PASSWORD_LENGTH};
pub use store::{validate_service, CredentialStore, PartialLoad, Retrieved, StoreError};
