use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong while writing or reading a tape, or while
/// working with a keystore. Each variant carries one upstream cause and one
/// short contextual message; end-of-archive is not an error and is reported
/// as `None` by the reading operations instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The system random source failed while generating key material.
    #[error("random source failed")]
    Random(#[source] rand::Error),

    /// Generating a fresh tape label failed before anything was written.
    #[error("failed to create tape label")]
    LabelCreate(#[source] Box<Error>),

    #[error("failed to write tape label")]
    LabelWrite(#[source] Cause),

    #[error("failed to read tape label")]
    LabelRead(#[source] io::Error),

    /// The label did not decrypt under the supplied private key.
    #[error("failed to decrypt tape label")]
    LabelDecrypt(#[source] rsa::Error),

    /// The label signature did not verify under the supplied public key.
    #[error("tape label signature verification failed")]
    LabelSignature(#[source] rsa::Error),

    #[error("failed to initialize the stream cipher")]
    CipherInit,

    #[error("failed to stat `{path}`")]
    StatFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open input file `{path}`")]
    OpenInput {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open output file `{path}`")]
    OpenOutput {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy `{path}`")]
    CopyInput {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write entry header for `{path}`")]
    HeaderWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read entry header")]
    HeaderRead(#[source] io::Error),

    #[error("failed to flush tape")]
    Flush(#[source] io::Error),

    #[error("malformed keystore document")]
    KeystoreFormat(#[source] Cause),

    #[error("keystore `{0}` already exists")]
    KeystoreExists(String),

    #[error("keystore `{0}` not found")]
    KeystoreMissing(String),
}
