//! Durable conversation state: contact id -> current dialog state.
//!
//! Backed by a single JSON object (`{"<contactId>": "<STATE_NAME>"}`) that is
//! read once at startup and rewritten in full after every mutation. The
//! in-memory map is authoritative; persistence failures degrade to
//! at-risk-of-loss operation instead of stopping the engine.

use crate::dialog::ConvState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// In-memory record for one contact. Only the state name is persisted;
/// `updated_at` exists for observability and dies with the process.
#[derive(Debug, Clone)]
struct ContactRecord {
    state: ConvState,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Store of per-contact conversation states with write-through persistence.
///
/// All shared access goes through `get`/`set`; the `RwLock` inside is the one
/// synchronization boundary for conversation state.
pub struct ConversationStateStore {
    path: PathBuf,
    inner: RwLock<HashMap<String, ContactRecord>>,
}

/// Read and parse the state file. Split out so tests can assert on failures
/// that `load` deliberately swallows.
async fn read_state_file(path: &Path) -> Result<HashMap<String, ConvState>, StoreError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let names: HashMap<String, String> = serde_json::from_str(&raw)?;
    Ok(names
        .into_iter()
        .map(|(contact, name)| (contact, ConvState::from_name(&name)))
        .collect())
}

impl ConversationStateStore {
    /// Load the store from `path`. A missing file starts empty (normal first
    /// boot); a corrupt file logs a warning and also starts empty — never
    /// fatal.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let states = match read_state_file(&path).await {
            Ok(states) => {
                log::info!("loaded {} conversation state(s) from {}", states.len(), path.display());
                states
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no state file at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => {
                log::warn!(
                    "could not load state file {} ({}), starting empty",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        };
        let now = Utc::now();
        let inner = states
            .into_iter()
            .map(|(contact, state)| {
                (
                    contact,
                    ContactRecord {
                        state,
                        updated_at: now,
                    },
                )
            })
            .collect();
        Self {
            path,
            inner: RwLock::new(inner),
        }
    }

    /// Current state for a contact; contacts we have never seen are at the
    /// main menu.
    pub async fn get(&self, contact_id: &str) -> ConvState {
        self.inner
            .read()
            .await
            .get(contact_id)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    /// Upsert the contact's state (map semantics, last write wins).
    pub async fn set(&self, contact_id: &str, state: ConvState) {
        let mut g = self.inner.write().await;
        g.insert(
            contact_id.to_string(),
            ContactRecord {
                state,
                updated_at: Utc::now(),
            },
        );
    }

    /// When the contact's record last changed, if we have one.
    pub async fn updated_at(&self, contact_id: &str) -> Option<DateTime<Utc>> {
        self.inner.read().await.get(contact_id).map(|r| r.updated_at)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Rewrite the whole state file. Called after every mutation; on failure
    /// the caller logs and the in-memory map stays authoritative until the
    /// next successful persist.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let names: HashMap<String, &'static str> = {
            let g = self.inner.read().await;
            g.iter()
                .map(|(contact, record)| (contact.clone(), record.state.as_name()))
                .collect()
        };
        let json = serde_json::to_string_pretty(&names)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
