use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "magtape", version, about = "Encrypted, signed tape archives")]
pub struct Cli {
    /// Log filter, e.g. `info` or `magtape=debug`.
    #[clap(long, default_value = "info")]
    pub log_filter: String,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pack files into an encrypted tape.
    Pack {
        /// The tape file to create.
        #[clap(long)]
        archive: PathBuf,
        /// Keystore name or absolute path.
        #[clap(long, default_value = "keys")]
        keystore: String,
        /// Private key that signs the tape label.
        #[clap(long)]
        privkey: String,
        /// Public key the tape label is encrypted to.
        #[clap(long)]
        pubkey: String,
        /// Directory to archive recursively.
        #[clap(long)]
        dir: Option<String>,
        /// Individual files to archive.
        files: Vec<String>,
    },
    /// Restore every file from a tape to its recorded path.
    Unpack {
        #[clap(long)]
        archive: PathBuf,
        #[clap(long, default_value = "keys")]
        keystore: String,
        /// Private key that decrypts the tape label.
        #[clap(long)]
        privkey: String,
        /// Public key the label signature is checked against.
        #[clap(long)]
        pubkey: String,
    },
    /// List the entry names on a tape without extracting.
    Contents {
        #[clap(long)]
        archive: PathBuf,
        #[clap(long, default_value = "keys")]
        keystore: String,
        #[clap(long)]
        privkey: String,
        #[clap(long)]
        pubkey: String,
    },
    /// Create a new, empty keystore.
    CreateKeystore {
        /// Keystore name or absolute path.
        name: String,
    },
    /// Generate an RSA key pair and store it under a name.
    CreateKey {
        name: String,
        #[clap(long, default_value = "keys")]
        keystore: String,
        #[clap(long, default_value_t = 4096)]
        bits: usize,
    },
    /// Import a PEM-encoded key into the keystore.
    ImportKey {
        name: String,
        #[clap(long, default_value = "keys")]
        keystore: String,
        #[clap(long)]
        pem_file: PathBuf,
    },
    /// Export a key as PEM, to a file or stdout.
    ExportKey {
        name: String,
        #[clap(long, default_value = "keys")]
        keystore: String,
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// List the names in a keystore.
    ListKeys {
        #[clap(long, default_value = "keys")]
        keystore: String,
    },
    /// Remove a key from the keystore.
    RemoveKey {
        name: String,
        #[clap(long, default_value = "keys")]
        keystore: String,
    },
}
