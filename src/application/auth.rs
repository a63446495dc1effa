//! Bearer-token authentication against statically configured access keys.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::AccessKeySettings;
use crate::domain::roles::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid bearer token")]
    Invalid,
    #[error("role `{0}` required")]
    Forbidden(Role),
}

/// A configured access key. Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone)]
pub struct AccessKey {
    pub name: String,
    pub token_sha256: Vec<u8>,
    pub roles: Vec<Role>,
}

impl From<&AccessKeySettings> for AccessKey {
    fn from(settings: &AccessKeySettings) -> Self {
        Self {
            name: settings.name.clone(),
            token_sha256: settings.token_sha256.to_vec(),
            roles: settings.roles.clone(),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Holds the caller's principal, if any. Anonymous requests are allowed on
/// read-only routes.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Principal>);

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(Principal::is_admin)
    }

    /// Succeeds when the viewer holds `role`. Anonymous viewers are
    /// unauthenticated, known ones lacking the role are forbidden.
    pub fn require(&self, role: Role) -> Result<&Principal, AuthError> {
        match &self.0 {
            None => Err(AuthError::Missing),
            Some(principal) if principal.has_role(role) => Ok(principal),
            Some(_) => Err(AuthError::Forbidden(role)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    keys: Arc<[AccessKey]>,
}

impl Authenticator {
    pub fn new(keys: Vec<AccessKey>) -> Self {
        Self { keys: keys.into() }
    }

    pub fn hash_token(token: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().to_vec()
    }

    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Invalid);
        }

        let hashed = Self::hash_token(token);
        // Compare against every key so timing does not reveal which one matched.
        let mut matched = None;
        for key in self.keys.iter() {
            if bool::from(key.token_sha256.ct_eq(&hashed)) && matched.is_none() {
                matched = Some(key);
            }
        }

        matched
            .map(|key| Principal {
                name: key.name.clone(),
                roles: key.roles.clone(),
            })
            .ok_or(AuthError::Invalid)
    }
}
