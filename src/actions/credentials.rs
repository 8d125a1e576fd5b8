use crate::AuthError;
use crate::crypto::PasswordHasher;
use crate::repository::{AuthUser, UserRepository};

/// Verified against when the user does not exist, so unknown users cost the
/// same Argon2 work as wrong passwords.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Outcome of a user ID + password check.
///
/// Callers must collapse every failure into one generic error before it
/// reaches the client; the variants exist for logs and events only.
#[derive(Debug)]
pub enum CredentialCheck {
    Valid(AuthUser),
    UnknownUser,
    WrongPassword,
    MalformedHash,
}

impl CredentialCheck {
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Self::Valid(_) => None,
            Self::UnknownUser => Some("unknown user"),
            Self::WrongPassword => Some("invalid password"),
            Self::MalformedHash => Some("malformed password hash"),
        }
    }
}

/// Looks the user up and verifies the password.
///
/// Only store failures are errors.
pub async fn check_credentials<U>(
    users: &U,
    hasher: &dyn PasswordHasher,
    user_id: &str,
    password: &str,
) -> Result<CredentialCheck, AuthError>
where
    U: UserRepository + ?Sized,
{
    let Some(user) = users.find_user_by_id(user_id).await? else {
        let _ = hasher.verify(password, DUMMY_HASH);
        return Ok(CredentialCheck::UnknownUser);
    };

    match hasher.verify(password, &user.hashed_password) {
        Ok(true) => Ok(CredentialCheck::Valid(user)),
        Ok(false) => Ok(CredentialCheck::WrongPassword),
        Err(_) => {
            log::error!(
                target: "portcullis",
                "msg=\"stored password hash is malformed\" user_id=\"{user_id}\""
            );
            Ok(CredentialCheck::MalformedHash)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Argon2Hasher;
    use crate::repository::InMemoryCredentialStore;

    #[tokio::test]
    async fn test_check_credentials() {
        let store = InMemoryCredentialStore::new();
        let hasher = Argon2Hasher::default();
        store
            .insert_user(AuthUser::new("alice", "Alice", "", hasher.hash("wonderland").unwrap()))
            .unwrap();
        store
            .insert_user(AuthUser::new("bob", "Bob", "", "not-a-hash"))
            .unwrap();

        let valid = check_credentials(&store, &hasher, "alice", "wonderland").await.unwrap();
        assert!(matches!(valid, CredentialCheck::Valid(ref u) if u.id == "alice"));
        assert!(valid.failure_reason().is_none());

        let wrong = check_credentials(&store, &hasher, "alice", "nope").await.unwrap();
        assert!(matches!(wrong, CredentialCheck::WrongPassword));

        let unknown = check_credentials(&store, &hasher, "carol", "wonderland").await.unwrap();
        assert!(matches!(unknown, CredentialCheck::UnknownUser));

        let malformed = check_credentials(&store, &hasher, "bob", "x").await.unwrap();
        assert!(matches!(malformed, CredentialCheck::MalformedHash));
    }

    #[test]
    fn test_dummy_hash_parses() {
        // a parse failure would make unknown users cheaper than wrong passwords
        assert!(password_hash::PasswordHash::new(DUMMY_HASH).is_ok());
        assert_eq!(Argon2Hasher::default().verify("x", DUMMY_HASH), Ok(false));
    }
}
