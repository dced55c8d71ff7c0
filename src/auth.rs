use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::{
    AppState,
    entities::user,
    error::{AppError, AppResult},
};

/// Salted one-way password hashing with Argon2id.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("failed to hash password: {e}").into())
    }

    /// A malformed stored hash counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(password_hash::Error::Password) => false,
            Err(err) => {
                tracing::warn!(error = %err, "password verification failed");
                false
            },
        }
    }
}

/// The user whose basic-auth credentials were accepted for this request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let Some(Authorization(creds)) = req.headers().typed_get::<Authorization<Basic>>() else {
        debug!(path = %req.uri().path(), "missing basic auth credentials");
        return Err(AppError::Unauthenticated);
    };

    let user = authenticate(&state, creds.username(), creds.password()).await?;
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

async fn authenticate(state: &AppState, username: &str, password: &str) -> AppResult<user::Model> {
    let found =
        user::Entity::find().filter(user::Column::Username.eq(username)).one(&state.db).await?;

    match found {
        Some(user) if state.hasher.verify(password, &user.password_hash) => Ok(user),
        Some(_) => {
            debug!(username = %username, "wrong password");
            Err(AppError::Unauthenticated)
        },
        None => {
            debug!(username = %username, "unknown user");
            Err(AppError::Unauthenticated)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(8, 1).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hasher = hasher();
        let hash = hasher.hash("pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("pass", &hash));
        assert!(!hasher.verify("Pass", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = hasher();
        assert_ne!(hasher.hash("pass").unwrap(), hasher.hash("pass").unwrap());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!hasher().verify("pass", "not-a-phc-string"));
    }

    #[test]
    fn rejects_impossible_params() {
        assert!(PasswordHasher::new(0, 0).is_err());
    }
}
