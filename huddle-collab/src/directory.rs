use std::{fs, path::Path};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::{AuthError, Authenticator, TokenClaims, UserRecord};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Could not read users file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Users file is not valid: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An in-memory user directory.
///
/// Tokens registered with [MemoryDirectory::insert_token] are accepted as-is,
/// which makes this directory a complete [Authenticator] for local setups and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserRecord>,
    tokens: DashMap<String, TokenClaims>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads users from a JSON array of user records
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let contents = fs::read_to_string(path)?;
        let users: Vec<UserRecord> = serde_json::from_str(&contents)?;

        let directory = Self::new();
        users.into_iter().for_each(|u| directory.insert_user(u));

        Ok(directory)
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_token(&self, token: &str, user_id: &str, expires_at: DateTime<Utc>) {
        self.tokens.insert(
            token.to_string(),
            TokenClaims {
                user_id: user_id.to_string(),
                expires_at,
            },
        );
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.get(user_id).map(|u| u.clone())
    }
}

#[async_trait]
impl Authenticator for MemoryDirectory {
    async fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.tokens
            .get(token)
            .map(|c| c.clone())
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.user(user_id))
    }
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    exp: i64,
}

/// Verifies HS256 JSON web tokens issued by the LMS, and resolves users from a [MemoryDirectory]
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
    directory: MemoryDirectory,
}

impl JwtAuthenticator {
    pub fn new(secret: &str, directory: MemoryDirectory) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            directory,
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::InvalidToken("token expired".to_string()),
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let expires_at = DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken("expiry out of range".to_string()))?;

        Ok(TokenClaims {
            user_id: data.claims.sub,
            expires_at,
        })
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.directory.user(user_id))
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    use crate::{test_util::record, UserType};

    use super::*;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: i64,
    }

    fn sign(secret: &str, sub: &str, exp: DateTime<Utc>) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub,
                exp: exp.timestamp(),
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token is signed")
    }

    #[tokio::test]
    async fn jwt_round_trip() {
        let directory = MemoryDirectory::new();
        directory.insert_user(record("alice", UserType::Instructor, "sub-123"));
        let auth = JwtAuthenticator::new("secret", directory);

        let token = sign("secret", "alice", Utc::now() + Duration::hours(1));
        let claims = auth.verify_token(&token).await.expect("token verifies");

        assert_eq!(claims.user_id, "alice");
        assert!(auth.load_user("alice").await.unwrap().is_some());
        assert!(auth.load_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn jwt_rejections() {
        let auth = JwtAuthenticator::new("secret", MemoryDirectory::new());

        let forged = sign("other-secret", "alice", Utc::now() + Duration::hours(1));
        let expired = sign("secret", "alice", Utc::now() - Duration::minutes(5));

        assert!(matches!(
            auth.verify_token(&forged).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            auth.verify_token(&expired).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            auth.verify_token("not.a.jwt").await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn users_file_parses() {
        let path = std::env::temp_dir().join(format!("huddle-users-{}.json", std::process::id()));

        fs::write(
            &path,
            r#"[{"id":"alice","name":"Alice","email":"alice@school.test","userType":"instructor","subscription":"sub-123"},
                {"id":"bob","name":"Bob","email":"bob@school.test","userType":"student","groups":["g1"]}]"#,
        )
        .unwrap();

        let directory = MemoryDirectory::from_json_file(&path).expect("file loads");
        fs::remove_file(&path).ok();

        assert_eq!(directory.user_count(), 2);
        assert_eq!(directory.user("bob").unwrap().groups, vec!["g1".to_string()]);
        assert_eq!(directory.user("bob").unwrap().subscription, None);
    }
}
