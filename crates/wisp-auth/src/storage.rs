//! Credential file I/O.
//!
//! Reads and writes the credential file (default `~/.wisp/credentials.json`)
//! with secure file permissions (0o600).

use std::path::Path;

use crate::errors::AuthError;
use crate::types::Credential;

/// Load the stored credential, if the file exists.
///
/// A corrupt file is treated as absent (with a warning) so a bad write never
/// wedges startup — the caller falls back to the authorization flow.
pub fn load_credential(path: &Path) -> Option<Credential> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to read credential file");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(cred) => Some(cred),
        Err(e) => {
            tracing::warn!(error = %e, ?path, "corrupt credential file, ignoring");
            None
        }
    }
}

/// Save a credential to file.
///
/// Creates parent directories if needed. Sets file permissions to 0o600.
pub fn save_credential(path: &Path, credential: &Credential) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(credential)?;
    std::fs::write(path, &json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }

    Ok(())
}

/// Remove the credential file, if present.
pub fn remove_credential(path: &Path) -> Result<(), AuthError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
