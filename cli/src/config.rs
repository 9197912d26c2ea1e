use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::random::random_hex;

/// Overrides the platform data directory.
pub const DATA_DIR_ENV: &str = "MEALMIND_DATA_DIR";

const SECRET_KEY_BYTES: usize = 32;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    /// Served under `/static`; avatars live in `images/`.
    pub static_dir: PathBuf,
    /// Spooled outgoing mail.
    pub outbox_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "mealmind")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::in_dir(&data_dir)
    }

    pub fn in_dir(data_dir: &Path) -> Result<Self> {
        let static_dir = data_dir.join("static");
        let outbox_dir = data_dir.join("outbox");
        for dir in [data_dir.to_path_buf(), static_dir.join("images"), outbox_dir.clone()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        Ok(Config {
            db_path: data_dir.join("mealmind.db"),
            data_dir: data_dir.to_path_buf(),
            static_dir,
            outbox_dir,
        })
    }

    fn secret_key_path(&self) -> PathBuf {
        self.data_dir.join("secret_key")
    }

    /// The HS256 signing secret, generated on first use.
    ///
    /// Returns `(secret, newly_created)`.
    pub fn load_or_create_secret_key(&self) -> Result<(String, bool)> {
        let path = self.secret_key_path();
        if let Some(secret) = read_secret(&path)? {
            return Ok((secret, false));
        }
        let secret = random_hex(SECRET_KEY_BYTES);
        write_private(&path, &secret)?;
        tracing::info!(path = %path.display(), "generated new secret key");
        Ok((secret, true))
    }
}

/// `None` when the file is missing or blank.
fn read_secret(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let secret = contents.trim();
            Ok((!secret.is_empty()).then(|| secret.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read secret key {}", path.display()))
        }
    }
}

/// Writes `contents` readable by the owner only.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write secret key {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();
        assert_eq!(config.db_path, tmp.path().join("mealmind.db"));
        assert!(config.static_dir.join("images").is_dir());
        assert!(config.outbox_dir.is_dir());
    }

    #[test]
    fn test_secret_key_is_generated_once() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();

        let (first, created) = config.load_or_create_secret_key().unwrap();
        assert!(created);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        let (second, created_again) = config.load_or_create_secret_key().unwrap();
        assert!(!created_again);
        assert_eq!(first, second);
    }

    #[test]
    fn test_blank_secret_key_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("secret_key"), "  \n").unwrap();
        let (secret, created) = config.load_or_create_secret_key().unwrap();
        assert!(created);
        assert_eq!(secret.len(), SECRET_KEY_BYTES * 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();
        config.load_or_create_secret_key().unwrap();
        let mode = std::fs::metadata(tmp.path().join("secret_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
