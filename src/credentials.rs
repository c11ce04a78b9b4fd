//! Secure storage for link secrets using the system keyring.
//!
//! The account tier derives a per-device secret at login; the client keeps
//! it between runs in the native OS credential store:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use keyring::Entry;

const SERVICE_NAME: &str = "com.seriline.links";

/// Builds a unique account name for a device's link secret.
fn account_name(port: &str) -> String {
    format!("{}:secret", port)
}

/// Store the link secret for a device in the system keyring.
pub fn store_link_secret(port: &str, value: &str) -> Result<(), String> {
    let account = account_name(port);
    let entry = Entry::new(SERVICE_NAME, &account)
        .map_err(|e| format!("Failed to create keyring entry: {e}"))?;
    entry
        .set_password(value)
        .map_err(|e| format!("Failed to store link secret: {e}"))
}

/// Retrieve the link secret for a device from the system keyring.
/// Returns Ok(None) if no secret is stored.
pub fn get_link_secret(port: &str) -> Result<Option<String>, String> {
    let account = account_name(port);
    let entry = Entry::new(SERVICE_NAME, &account)
        .map_err(|e| format!("Failed to create keyring entry: {e}"))?;
    match entry.get_password() {
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(format!("Failed to retrieve link secret: {e}")),
    }
}

/// Delete the link secret for a device from the system keyring.
/// Returns Ok(()) even if no secret was stored.
pub fn delete_link_secret(port: &str) -> Result<(), String> {
    let account = account_name(port);
    let entry = Entry::new(SERVICE_NAME, &account)
        .map_err(|e| format!("Failed to create keyring entry: {e}"))?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()), // Already gone, that's fine
        Err(e) => Err(format!("Failed to delete link secret: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_name() {
        assert_eq!(account_name("/dev/ttyUSB0"), "/dev/ttyUSB0:secret");
    }
}
