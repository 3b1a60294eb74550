use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::Variant;

const SERVICE_NAME: &str = "swcache";

pub struct TokenStore;

impl TokenStore {
    fn entry(variant: Variant) -> Result<Entry> {
        Entry::new(SERVICE_NAME, variant.as_str()).context("Failed to create keyring entry")
    }

    /// Store the sync token for a variant in the OS keychain
    pub fn store(variant: Variant, token: &str) -> Result<()> {
        Self::entry(variant)?
            .set_password(token)
            .context("Failed to store sync token in keychain")?;
        Ok(())
    }

    /// Sync token for a variant, `None` when nothing is stored
    pub fn get(variant: Variant) -> Result<Option<String>> {
        match Self::entry(variant)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve sync token from keychain"),
        }
    }

    pub fn delete(variant: Variant) -> Result<()> {
        match Self::entry(variant)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete sync token from keychain"),
        }
    }
}
