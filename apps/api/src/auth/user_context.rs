//! The logged-in user as an explicit object.
//!
//! Loaded once at startup from a single JSON file, replaced on login, removed
//! on logout. Handed to the router through `AppState`; nothing reads the file
//! behind its back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::AuthError;
use crate::models::user::User;

#[derive(Clone)]
pub struct UserContext {
    path: PathBuf,
    current: Arc<RwLock<Option<User>>>,
}

impl UserContext {
    /// Reads the stored user, if any. A missing or unreadable file means
    /// nobody is logged in.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let current = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<User>(&bytes) {
                Ok(user) => {
                    info!(user = %user.name, "Restored logged-in user");
                    Some(user)
                }
                Err(e) => {
                    warn!("Ignoring unreadable user store {}: {e}", path.display());
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read user store {}: {e}", path.display());
                None
            }
        };

        Self {
            path,
            current: Arc::new(RwLock::new(current)),
        }
    }

    pub async fn current(&self) -> Option<User> {
        self.current.read().await.clone()
    }

    /// Stores the user in memory and on disk.
    pub async fn set(&self, user: User) -> Result<(), AuthError> {
        let bytes = serde_json::to_vec(&user)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        *self.current.write().await = Some(user);
        Ok(())
    }

    /// Logs out. Returns the user that was cleared, if any.
    pub async fn clear(&self) -> Result<Option<User>, AuthError> {
        let previous = self.current.write().await.take();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(previous)
    }
}
