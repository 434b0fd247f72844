//! Named RSA identities persisted on disk.
//!
//! A keystore is one JSON document with two maps: `PrivateKeys` holds
//! PKCS#1 private-key DER and `PublicKeys` holds SPKI public-key DER, both
//! as base64 strings. A named keystore `foo` lives at
//! `<home>/.repkey/foo.keys`; an absolute path bypasses that resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::vfs::Vfs;

#[derive(Default, Serialize, Deserialize)]
pub struct Keystore {
    #[serde(rename = "PrivateKeys", default, with = "base64_map")]
    private_keys: BTreeMap<String, Vec<u8>>,
    #[serde(rename = "PublicKeys", default, with = "base64_map")]
    public_keys: BTreeMap<String, Vec<u8>>,
}

/// The directory holding named keystores: `<home>/.repkey`.
pub fn default_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".repkey"))
}

/// Resolves a keystore name to its file path. Absolute paths are used
/// as-is; anything else becomes `<home>/.repkey/<name>.keys`.
pub fn keystore_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let dir = default_dir().ok_or_else(|| Error::KeystoreMissing(name.to_owned()))?;
    Ok(dir.join(format!("{name}.keys")))
}

fn exists(fs: &dyn Vfs, path: &Path) -> io::Result<bool> {
    match fs.metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

impl Keystore {
    /// Creates a new, empty keystore file for `name`. Refuses to touch an
    /// existing one. The parent directory is created with mode 0700, the
    /// file with mode 0600.
    pub fn create(fs: &dyn Vfs, name: &str) -> Result<Keystore> {
        let path = keystore_path(name)?;
        let wrap = |source| Error::OpenOutput {
            path: path.display().to_string(),
            source,
        };
        if exists(fs, &path).map_err(wrap)? {
            return Err(Error::KeystoreExists(name.to_owned()));
        }
        if let Some(parent) = path.parent() {
            fs.mkdir_all(parent, 0o700).map_err(wrap)?;
        }
        let mut file = fs.create(&path).map_err(wrap)?;
        let keystore = Keystore::default();
        keystore.save(&mut file)?;
        debug!(name, path = %path.display(), "created keystore");
        Ok(keystore)
    }

    /// Decodes a keystore document.
    pub fn open(reader: impl Read) -> Result<Keystore> {
        serde_json::from_reader(reader).map_err(|err| Error::KeystoreFormat(err.into()))
    }

    /// Opens the keystore file `name` resolves to (see [`keystore_path`]).
    pub fn open_named(fs: &dyn Vfs, name: &str) -> Result<Keystore> {
        let path = keystore_path(name)?;
        let file = match fs.open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(Error::KeystoreMissing(name.to_owned()));
            }
            Err(source) => {
                return Err(Error::OpenInput {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Keystore::open(file)
    }

    /// Encodes the keystore document.
    pub fn save(&self, mut writer: impl Write) -> Result<()> {
        serde_json::to_writer(&mut writer, self).map_err(|err| Error::KeystoreFormat(err.into()))?;
        writer
            .write_all(b"\n")
            .map_err(|err| Error::KeystoreFormat(err.into()))
    }

    /// Stores a private key under `name`, replacing any previous entry.
    pub fn add_private(&mut self, name: &str, key: &RsaPrivateKey) {
        let der = key
            .to_pkcs1_der()
            .expect("PKCS#1 encoding of an in-memory key cannot fail");
        self.private_keys
            .insert(name.to_owned(), der.as_bytes().to_vec());
    }

    /// Stores a public key under `name`, replacing any previous entry.
    pub fn add_public(&mut self, name: &str, key: &RsaPublicKey) {
        let der = key
            .to_public_key_der()
            .expect("SPKI encoding of an in-memory key cannot fail");
        self.public_keys
            .insert(name.to_owned(), der.as_bytes().to_vec());
    }

    /// Looks up a private key by name.
    ///
    /// Panics if the stored bytes are not valid PKCS#1 DER: the store only
    /// ever receives bytes it encoded itself, so that is a programmer
    /// error, not user input.
    pub fn find_private(&self, name: &str) -> Option<RsaPrivateKey> {
        let bytes = self.private_keys.get(name)?;
        let key = RsaPrivateKey::from_pkcs1_der(bytes)
            .expect("keystore holds invalid PKCS#1 private key bytes");
        Some(key)
    }

    /// Looks up a public key by name. A private entry shadows a public
    /// entry of the same name: its public half is derived and returned, so
    /// one name can serve as both identity and recipient without a
    /// duplicate entry.
    pub fn find_public(&self, name: &str) -> Option<RsaPublicKey> {
        if let Some(key) = self.find_private(name) {
            return Some(key.to_public_key());
        }
        let bytes = self.public_keys.get(name)?;
        let key = RsaPublicKey::from_public_key_der(bytes)
            .expect("keystore holds invalid SPKI public key bytes");
        Some(key)
    }

    /// Removes `name` from both maps. Idempotent.
    pub fn remove(&mut self, name: &str) {
        self.private_keys.remove(name);
        self.public_keys.remove(name);
    }

    pub fn private_names(&self) -> impl Iterator<Item = &str> {
        self.private_keys.keys().map(String::as_str)
    }

    pub fn public_names(&self) -> impl Iterator<Item = &str> {
        self.public_keys.keys().map(String::as_str)
    }
}

impl fmt::Debug for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Names only; never the key bytes.
        f.debug_struct("Keystore")
            .field("private_keys", &self.private_keys.keys().collect::<Vec<_>>())
            .field("public_keys", &self.public_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

mod base64_map {
    use std::collections::BTreeMap;

    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = map
            .iter()
            .map(|(name, bytes)| (name.as_str(), BASE64_STANDARD.encode(bytes)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(name, value)| {
                BASE64_STANDARD
                    .decode(&value)
                    .map(|bytes| (name, bytes))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::OsFs;
    use once_cell::sync::Lazy;
    use rand::rngs::OsRng;

    static KEY: Lazy<RsaPrivateKey> = Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());
    static OTHER_KEY: Lazy<RsaPrivateKey> =
        Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());

    #[test]
    fn add_and_find_private() {
        let mut keystore = Keystore::default();
        keystore.add_private("backup", &KEY);

        let found = keystore.find_private("backup").unwrap();
        assert_eq!(
            found.to_pkcs1_der().unwrap().as_bytes(),
            KEY.to_pkcs1_der().unwrap().as_bytes()
        );
        assert!(keystore.find_private("other").is_none());
    }

    #[test]
    fn private_entry_serves_public_lookups() {
        let mut keystore = Keystore::default();
        keystore.add_private("backup", &KEY);

        let public = keystore.find_public("backup").unwrap();
        assert_eq!(public, KEY.to_public_key());
    }

    #[test]
    fn private_entry_shadows_public_entry() {
        let mut keystore = Keystore::default();
        keystore.add_private("peer", &KEY);
        keystore.add_public("peer", &OTHER_KEY.to_public_key());

        // The private map wins for public lookups.
        assert_eq!(keystore.find_public("peer").unwrap(), KEY.to_public_key());
    }

    #[test]
    fn public_only_entry() {
        let mut keystore = Keystore::default();
        keystore.add_public("peer", &KEY.to_public_key());

        assert!(keystore.find_private("peer").is_none());
        assert_eq!(keystore.find_public("peer").unwrap(), KEY.to_public_key());
    }

    #[test]
    fn remove_clears_both_maps() {
        let mut keystore = Keystore::default();
        keystore.add_private("peer", &KEY);
        keystore.add_public("peer", &OTHER_KEY.to_public_key());

        keystore.remove("peer");
        assert!(keystore.find_private("peer").is_none());
        assert!(keystore.find_public("peer").is_none());
        // Removing again is fine.
        keystore.remove("peer");
    }

    #[test]
    fn save_open_roundtrip() {
        let mut keystore = Keystore::default();
        keystore.add_private("a", &KEY);
        keystore.add_public("b", &OTHER_KEY.to_public_key());

        let mut buf = Vec::new();
        keystore.save(&mut buf).unwrap();
        let reopened = Keystore::open(buf.as_slice()).unwrap();

        assert_eq!(
            reopened.find_private("a").unwrap().to_pkcs1_der().unwrap().as_bytes(),
            KEY.to_pkcs1_der().unwrap().as_bytes()
        );
        assert_eq!(
            reopened.find_public("b").unwrap(),
            OTHER_KEY.to_public_key()
        );
        assert_eq!(reopened.private_names().collect::<Vec<_>>(), ["a"]);
        assert_eq!(reopened.public_names().collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn document_shape_is_two_base64_maps() {
        let mut keystore = Keystore::default();
        keystore.add_public("peer", &KEY.to_public_key());

        let mut buf = Vec::new();
        keystore.save(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert!(value["PrivateKeys"].as_object().unwrap().is_empty());
        let encoded = value["PublicKeys"]["peer"].as_str().unwrap();
        let decoded = {
            use base64::{prelude::BASE64_STANDARD, Engine};
            BASE64_STANDARD.decode(encoded).unwrap()
        };
        assert_eq!(
            decoded,
            KEY.to_public_key().to_public_key_der().unwrap().as_bytes()
        );
    }

    #[test]
    fn open_rejects_garbage() {
        let err = Keystore::open(&b"not json"[..]).unwrap_err();
        assert!(matches!(err, Error::KeystoreFormat(_)), "got {err:?}");
    }

    #[test]
    fn open_named_reports_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("absent.keys");
        let err = Keystore::open_named(&OsFs, name.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Error::KeystoreMissing(_)), "got {err:?}");
    }

    #[test]
    fn open_named_reads_back_a_created_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.keys");
        let name = path.to_str().unwrap();

        let mut keystore = Keystore::create(&OsFs, name).unwrap();
        keystore.add_private("a", &KEY);
        let mut file = fs_err::File::create(&path).unwrap();
        keystore.save(&mut file).unwrap();
        drop(file);

        let reopened = Keystore::open_named(&OsFs, name).unwrap();
        assert!(reopened.find_private("a").is_some());
    }

    #[test]
    fn create_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.keys");
        let name = path.to_str().unwrap();

        Keystore::create(&OsFs, name).unwrap();
        let err = Keystore::create(&OsFs, name).unwrap_err();
        assert!(matches!(err, Error::KeystoreExists(_)), "got {err:?}");
    }

    #[test]
    fn create_writes_an_openable_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.keys");
        let name = path.to_str().unwrap();

        Keystore::create(&OsFs, name).unwrap();
        let keystore = Keystore::open(fs_err::File::open(&path).unwrap()).unwrap();
        assert_eq!(keystore.private_names().count(), 0);
        assert_eq!(keystore.public_names().count(), 0);
    }

    #[test]
    fn named_path_resolution() {
        let named = keystore_path("work").unwrap();
        assert!(named.ends_with(".repkey/work.keys") || named.ends_with(".repkey\\work.keys"));

        let absolute = if cfg!(windows) { "C:\\keys\\work.keys" } else { "/keys/work.keys" };
        assert_eq!(keystore_path(absolute).unwrap(), Path::new(absolute));
    }
}
