use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Garmin session cookies kept between runs so one-shot syncs do not sign in
/// every time. Keyed by the URL the cookies are sent to; values are `Cookie`
/// header strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub email: String,
    pub saved_at: DateTime<Utc>,
    pub cookies: BTreeMap<String, String>,
}

impl SavedSession {
    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        let session = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse session file: {}", path.display()))?;
        Ok(Some(session))
    }

    /// The session was opened for `email` and has something to send.
    pub fn usable_for(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email) && self.cookies.values().any(|c| !c.is_empty())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to encode session")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        Ok(())
    }
}
