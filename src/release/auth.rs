use std::fmt;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::ParseError;
use crate::release::types::RepositoryIdentity;

/// Headers attached to every remote call of a run.
///
/// Built once from the repository's token and never modified afterwards.
#[derive(Clone, Default)]
pub struct AuthHeaders {
    headers: HeaderMap,
}

impl AuthHeaders {
    /// `Authorization: Bearer <token>` when the repository carries a token, nothing otherwise
    pub fn for_repository(repo: &RepositoryIdentity) -> Result<Self, ParseError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = repo.token() {
            let mut value =
                HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| ParseError::Token)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self { headers })
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_anonymous(&self) -> bool {
        self.headers.is_empty()
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("anonymous", &self.is_anonymous())
            .finish()
    }
}
