//! User profiles and the user directory

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{PostboxError, PostboxResult};
use crate::message::User;

/// Membership plan of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Free membership, sees truncated messages
    Free,
    /// Paying membership
    Paid,
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionTier::Free => write!(f, "free"),
            SubscriptionTier::Paid => write!(f, "paid"),
        }
    }
}

/// Per-user preferences consulted when translating and rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Language the user wants messages displayed in
    #[serde(default)]
    pub preferred_language: Option<String>,
    /// Active subscription, if any
    #[serde(default)]
    pub subscription: Option<SubscriptionTier>,
}

impl UserProfile {
    /// Whether this profile gets the full, untruncated message body
    pub fn is_paying(&self) -> bool {
        matches!(self.subscription, Some(SubscriptionTier::Paid))
    }
}

/// Lookup of users and their profiles
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a username to a user
    async fn find_by_username(&self, username: &str) -> PostboxResult<Option<User>>;

    /// Fetch the profile of a user, `None` when the user has none
    async fn profile(&self, user: &User) -> PostboxResult<Option<UserProfile>>;
}

/// One entry of a directory file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// In-memory user directory, optionally loaded from a TOML file
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<String, User>,
    profiles: DashMap<Uuid, UserProfile>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory from a TOML file with `[[users]]` tables
    pub fn load(path: &Path) -> PostboxResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: DirectoryFile = toml::from_str(&content)?;

        let directory = Self::new();
        for record in file.users {
            let user = User::with_id(record.id, record.username);
            directory.insert(user, Some(record.profile));
        }
        tracing::debug!("Loaded {} users from {}", directory.len(), path.display());
        Ok(directory)
    }

    /// Register a user, replacing any user with the same username
    pub fn insert(&self, user: User, profile: Option<UserProfile>) {
        match profile {
            Some(profile) => {
                self.profiles.insert(user.id, profile);
            }
            None => {
                self.profiles.remove(&user.id);
            }
        }
        self.users.insert(user.username.clone(), user);
    }

    /// Register a new user by name and return it
    pub fn add(&self, username: &str, profile: Option<UserProfile>) -> User {
        let user = User::new(username);
        self.insert(user.clone(), profile);
        user
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_username(&self, username: &str) -> PostboxResult<Option<User>> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }

    async fn profile(&self, user: &User) -> PostboxResult<Option<UserProfile>> {
        if !self.users.contains_key(&user.username) {
            return Err(PostboxError::not_found(format!("User {}", user.username)));
        }
        Ok(self.profiles.get(&user.id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_lookup() {
        let directory = MemoryDirectory::new();
        let alice = directory.add(
            "alice",
            Some(UserProfile {
                preferred_language: Some("de".to_string()),
                subscription: Some(SubscriptionTier::Paid),
            }),
        );
        let bob = directory.add("bob", None);

        let found = tokio_test::block_on(directory.find_by_username("alice")).unwrap();
        assert_eq!(found, Some(alice.clone()));
        assert!(tokio_test::block_on(directory.find_by_username("carol")).unwrap().is_none());

        let profile = tokio_test::block_on(directory.profile(&alice)).unwrap().unwrap();
        assert!(profile.is_paying());
        assert!(tokio_test::block_on(directory.profile(&bob)).unwrap().is_none());

        let stranger = User::new("mallory");
        assert!(tokio_test::block_on(directory.profile(&stranger)).is_err());
    }

    #[test]
    fn test_directory_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("users.toml");
        std::fs::write(
            &path,
            r#"
[[users]]
id = "6f1c1f3e-2b51-4c1e-9a3a-3f4f1a2b0c01"
username = "alice"
preferred_language = "fr"
subscription = "paid"

[[users]]
id = "6f1c1f3e-2b51-4c1e-9a3a-3f4f1a2b0c02"
username = "bob"
"#,
        )
        .unwrap();

        let directory = MemoryDirectory::load(&path).unwrap();
        assert_eq!(directory.len(), 2);

        let alice = tokio_test::block_on(directory.find_by_username("alice")).unwrap().unwrap();
        let profile = tokio_test::block_on(directory.profile(&alice)).unwrap().unwrap();
        assert_eq!(profile.preferred_language.as_deref(), Some("fr"));
        assert_eq!(profile.subscription, Some(SubscriptionTier::Paid));
    }

    #[test]
    fn test_free_profile_is_not_paying() {
        assert!(!UserProfile::default().is_paying());
        let free = UserProfile {
            preferred_language: None,
            subscription: Some(SubscriptionTier::Free),
        };
        assert!(!free.is_paying());
    }
}
