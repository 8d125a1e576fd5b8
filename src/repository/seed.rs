use serde::Deserialize;

use super::client::{GrantType, OAuthClient};
use super::memory::InMemoryCredentialStore;
use super::user::AuthUser;
use crate::AuthError;
use crate::crypto::{PasswordHasher, hash_token};

/// A user as written in a seed file. The password is plaintext and gets
/// hashed on load.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

/// A client as written in a seed file.
///
/// `redirect_uris` is a list here and gets joined with the configured
/// separator when loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedClient {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub secret: String,
    pub redirect_uris: Vec<String>,
    pub grants: Vec<GrantType>,
    #[serde(default)]
    pub skip_authorization: bool,
}

/// Fixture data for [`InMemoryCredentialStore`].
///
/// ```json
/// {
///   "users": [{ "id": "alice", "name": "Alice", "password": "wonderland" }],
///   "clients": [{
///     "id": "c1", "secret": "s3cret",
///     "redirect_uris": ["https://app/cb"],
///     "grants": ["authorization_code", "refresh_token"]
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub clients: Vec<SeedClient>,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json)
            .map_err(|e| AuthError::ConfigurationError(format!("invalid seed data: {e}")))
    }

    /// Hashes every secret and loads the result into `store`.
    pub fn apply(
        &self,
        store: &InMemoryCredentialStore,
        hasher: &dyn PasswordHasher,
        redirect_uri_separator: &str,
    ) -> Result<(), AuthError> {
        for user in &self.users {
            let hashed = hasher.hash(&user.password)?;
            store.insert_user(AuthUser::new(&user.id, &user.name, &user.email, hashed))?;
        }

        for client in &self.clients {
            if let Some(bad) = client
                .redirect_uris
                .iter()
                .find(|uri| uri.contains(redirect_uri_separator))
            {
                return Err(AuthError::ConfigurationError(format!(
                    "redirect uri {bad:?} of client {} contains the separator",
                    client.id
                )));
            }

            store.insert_client(OAuthClient {
                id: client.id.clone(),
                name: if client.name.is_empty() {
                    client.id.clone()
                } else {
                    client.name.clone()
                },
                secret_hash: hash_token(&client.secret),
                redirect_uris: client.redirect_uris.join(redirect_uri_separator),
                grants: client.grants.clone(),
                skip_authorization: client.skip_authorization,
            })?;
        }

        log::info!(
            target: "portcullis",
            "msg=\"seed data loaded\" users={} clients={}",
            self.users.len(),
            self.clients.len()
        );

        Ok(())
    }
}
