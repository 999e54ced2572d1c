use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::data_dir;
use crate::model::user::User;

const SESSION_FILE_NAME: &str = "session.json";

/// Source of the current identity and bearer token.
///
/// The task store calls `logout` when the server rejects the token; it never
/// reads ambient state to find a session.
pub trait SessionProvider: Send + Sync {
    fn user(&self) -> Option<User>;
    fn token(&self) -> Option<String>;
    fn logout(&self);
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct StoredSession {
    token: String,
    user: User,
}

/// Session persisted as `session.json` in the data directory.
pub struct FileSessionProvider {
    file_path: PathBuf,
    current: RwLock<Option<StoredSession>>,
}

impl FileSessionProvider {
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut path = match base_dir {
            Some(dir) => dir,
            None => data_dir()?,
        };
        fs::create_dir_all(&path)?;
        path.push(SESSION_FILE_NAME);

        let current = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            match serde_json::from_reader(reader) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable session file");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            file_path: path,
            current: RwLock::new(current),
        })
    }

    pub fn login(&self, token: String, user: User) -> Result<()> {
        let session = StoredSession { token, user };
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut writer = BufWriter::new(options.open(&self.file_path)?);
        serde_json::to_writer_pretty(&mut writer, &session)?;
        writer.flush()?;

        // Opening an existing file keeps its old mode.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.file_path, fs::Permissions::from_mode(0o600))?;
        }
        tracing::info!(user = %session.user.name, "session stored");
        *self.current.write() = Some(session);
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }
}

impl SessionProvider for FileSessionProvider {
    fn user(&self) -> Option<User> {
        self.current.read().as_ref().map(|s| s.user.clone())
    }

    fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.token.clone())
    }

    fn logout(&self) {
        *self.current.write() = None;
        if self.file_path.exists() {
            if let Err(e) = fs::remove_file(&self.file_path) {
                tracing::error!(error = %e, "failed to remove session file");
            }
        }
        tracing::info!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let session = FileSessionProvider::new(Some(dir.path().to_path_buf())).unwrap();
        assert!(!session.is_signed_in());
        assert_eq!(session.token(), None);

        session.login("mock-token".into(), User::named("Usuário Teste")).unwrap();

        let reopened = FileSessionProvider::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(reopened.token().as_deref(), Some("mock-token"));
        assert_eq!(reopened.user().map(|u| u.name), Some("Usuário Teste".to_string()));
    }

    #[test]
    fn test_logout_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = FileSessionProvider::new(Some(dir.path().to_path_buf())).unwrap();
        session.login("mock-token".into(), User::named("a")).unwrap();

        session.logout();

        assert_eq!(session.token(), None);
        assert!(!dir.path().join(SESSION_FILE_NAME).exists());
        // Logging out twice is harmless.
        session.logout();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE_NAME);
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let session = FileSessionProvider::new(Some(dir.path().to_path_buf())).unwrap();
        session.login("mock-token".into(), User::named("a")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_means_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SESSION_FILE_NAME), "{").unwrap();

        let session = FileSessionProvider::new(Some(dir.path().to_path_buf())).unwrap();
        assert!(!session.is_signed_in());
    }
}
