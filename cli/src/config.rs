use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::fmt;
use std::path::PathBuf;

pub const EMAIL_VAR: &str = "GARMIN_EMAIL";
pub const PASSWORD_VAR: &str = "GARMIN_PASSWORD";

pub struct Config {
    pub db_path: PathBuf,
    /// Saved Garmin session, kept next to the database.
    pub session_path: PathBuf,
}

impl Config {
    /// Resolve the database path: `--db` / `WEIGHTSYNC_DB` if given, otherwise
    /// `weight_data.db` in the platform data directory. The parent directory
    /// is created if missing.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_override {
            Some(path) => path,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "weightsync")
                    .context("Could not determine home directory")?;
                proj_dirs.data_dir().join("weight_data.db")
            }
        };

        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        }

        let session_path = db_path.with_file_name("garmin_session.json");
        Ok(Config {
            db_path,
            session_path,
        })
    }
}

/// Garmin Connect login. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let email = lookup(EMAIL_VAR).filter(|v| !v.trim().is_empty());
        let password = lookup(PASSWORD_VAR).filter(|v| !v.is_empty());
        match (email, password) {
            (Some(email), Some(password)) => Ok(Self {
                email: email.trim().to_string(),
                password,
            }),
            _ => bail!("Please set {EMAIL_VAR} and {PASSWORD_VAR} environment variables"),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
