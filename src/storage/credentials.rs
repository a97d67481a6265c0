use std::{collections::HashMap, io, path::PathBuf, sync::Arc};

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand_core::OsRng;
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Username already exists!")]
    UsernameTaken,
    #[error("Usernames must not be empty or contain commas or line breaks.")]
    InvalidUsername,
    #[error("Password must not be empty.")]
    EmptyPassword,
    #[error("Invalid username or password!")]
    InvalidCredentials,
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("credential store unavailable: {0}")]
    Io(#[from] io::Error),
}

/// Append-only `username,password_hash` file.
///
/// Registration checks and appends while holding the store's lock, so two
/// registrations of one name cannot both succeed within this process.
#[derive(Clone)]
pub struct CredentialStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }

        let password = password.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| CredentialError::Hash(err.to_string()))?
            .map_err(|err| CredentialError::Hash(err.to_string()))?;

        let _guard = self.write_lock.lock().await;
        let users = self.load().await?;
        if users.contains_key(username) {
            return Err(CredentialError::UsernameTaken);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{username},{password_hash}\n").as_bytes())
            .await?;
        file.flush().await?;

        Ok(())
    }

    /// Unknown usernames and wrong passwords fail identically.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let mut users = self.load().await?;
        let Some(stored) = users.remove(username) else {
            return Err(CredentialError::InvalidCredentials);
        };

        let password = password.to_owned();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .unwrap_or(false);
        if verified {
            Ok(())
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>, CredentialError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(parse_records(&contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

fn validate_username(username: &str) -> Result<(), CredentialError> {
    if username.trim().is_empty() || username.contains([',', '\n', '\r']) {
        return Err(CredentialError::InvalidUsername);
    }
    Ok(())
}

/// Parses stored records; the first record for a username wins.
fn parse_records(contents: &str) -> HashMap<String, String> {
    let mut users = HashMap::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(',') {
            Some((username, hash)) if !username.is_empty() && !hash.is_empty() => {
                users
                    .entry(username.to_string())
                    .or_insert_with(|| hash.to_string());
            }
            _ => warn!(line = index + 1, "skipping malformed credential record"),
        }
    }
    users
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}
