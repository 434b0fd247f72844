pub mod cli;
mod keys;
mod pack;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command};

pub fn setup_logger(log_filter: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_new(log_filter)?)
        .init();
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Pack {
            archive,
            keystore,
            privkey,
            pubkey,
            dir,
            files,
        } => pack::pack(&archive, &keystore, &privkey, &pubkey, dir.as_deref(), &files),
        Command::Unpack {
            archive,
            keystore,
            privkey,
            pubkey,
        } => pack::unpack(&archive, &keystore, &privkey, &pubkey),
        Command::Contents {
            archive,
            keystore,
            privkey,
            pubkey,
        } => pack::contents(&archive, &keystore, &privkey, &pubkey),
        Command::CreateKeystore { name } => keys::create_keystore(&name),
        Command::CreateKey {
            name,
            keystore,
            bits,
        } => keys::create_key(&keystore, &name, bits),
        Command::ImportKey {
            name,
            keystore,
            pem_file,
        } => keys::import_key(&keystore, &name, &pem_file),
        Command::ExportKey {
            name,
            keystore,
            out,
        } => keys::export_key(&keystore, &name, out.as_deref()),
        Command::ListKeys { keystore } => keys::list_keys(&keystore),
        Command::RemoveKey { name, keystore } => keys::remove_key(&keystore, &name),
    }
}
