use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use magtape_core::{keystore, pem, Keystore, OsFs};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use tracing::info;

pub fn create_keystore(name: &str) -> Result<()> {
    Keystore::create(&OsFs, name)?;
    info!(name, "created keystore");
    Ok(())
}

fn load(name: &str) -> Result<(Keystore, PathBuf)> {
    let path = keystore::keystore_path(name)?;
    let keystore = Keystore::open_named(&OsFs, name)
        .with_context(|| format!("failed to open keystore `{name}`"))?;
    Ok((keystore, path))
}

fn store(keystore: &Keystore, path: &Path) -> Result<()> {
    let mut file = fs_err::File::create(path)
        .with_context(|| format!("failed to write keystore {}", path.display()))?;
    keystore.save(&mut file)?;
    Ok(())
}

pub fn create_key(keystore_name: &str, name: &str, bits: usize) -> Result<()> {
    if !matches!(bits, 2048 | 3072 | 4096) {
        bail!("unsupported key size {bits}: pick 2048, 3072 or 4096");
    }
    let (mut keystore, path) = load(keystore_name)?;
    info!(name, bits, "generating RSA key pair");
    let key = RsaPrivateKey::new(&mut OsRng, bits).context("RSA key generation failed")?;
    keystore.add_private(name, &key);
    store(&keystore, &path)?;
    info!(name, "stored new key");
    Ok(())
}

pub fn import_key(keystore_name: &str, name: &str, pem_file: &Path) -> Result<()> {
    let (mut keystore, path) = load(keystore_name)?;
    let text = fs_err::read_to_string(pem_file)?;
    pem::import_key(&mut keystore, name, &text)?;
    store(&keystore, &path)?;
    info!(name, "imported key");
    Ok(())
}

pub fn export_key(keystore_name: &str, name: &str, out: Option<&Path>) -> Result<()> {
    let (keystore, _) = load(keystore_name)?;
    let text = pem::export_key(&keystore, name)
        .with_context(|| format!("key `{name}` not found in keystore"))?;
    match out {
        Some(path) => fs_err::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

pub fn list_keys(keystore_name: &str) -> Result<()> {
    let (keystore, _) = load(keystore_name)?;
    println!("Private keys:");
    for name in keystore.private_names() {
        println!("  {name}");
    }
    println!("Public keys:");
    for name in keystore.public_names() {
        println!("  {name}");
    }
    Ok(())
}

pub fn remove_key(keystore_name: &str, name: &str) -> Result<()> {
    let (mut keystore, path) = load(keystore_name)?;
    keystore.remove(name);
    store(&keystore, &path)?;
    info!(name, "removed key");
    Ok(())
}
