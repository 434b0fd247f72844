//! Encrypted, signed tape archives.
//!
//! A tape is one archive file: a fixed-size cryptographic label (the
//! AES-256 session key and IV, RSA-encrypted to the recipient and
//! RSA-signed by the sender) followed by a tar-family entry stream running
//! through AES-256-CTR. The [`keystore`] module persists the named RSA
//! identities that tape operations run under.

pub mod error;
pub mod keystore;
pub mod label;
pub mod pem;
pub mod stream;
pub mod tape;
pub mod vfs;

mod entry;

pub use error::{Error, Result};
pub use keystore::Keystore;
pub use label::Label;
pub use tape::{TapeKey, TapeReader, TapeWriter};
pub use vfs::{FileMeta, OsFs, Vfs};
