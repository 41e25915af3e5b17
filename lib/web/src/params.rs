use crate::error::ProfScopeServerError;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::RequestPartsExt;
use serde::Deserialize;

/// The query of a view request: the profile name `pn`, the symbol `f` of listing views and the
/// report variables, kept in request order.
#[derive(Debug, Clone, Default)]
pub struct ViewParams {
    pairs: Vec<(String, String)>,
}

impl ViewParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// The first value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// The name of the profile the request is pinned to.
    pub fn profile_name(&self) -> Option<&str> {
        self.get("pn")
    }

    /// The symbol regex of listing views. Empty if not given.
    pub fn symbol(&self) -> &str {
        self.get("f").unwrap_or_default()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ViewParams {
    type Rejection = ProfScopeServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = parts
            .extract::<Query<Vec<(String, String)>>>()
            .await
            .map_err(|rejection| ProfScopeServerError::BadRequest(rejection.body_text()))?;
        Ok(Self::new(pairs))
    }
}

/// The query of `genprof`: profile type `pt` and sampling duration `sd`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureQuery {
    pub pt: Option<String>,
    pub sd: Option<String>,
}

/// The query of `clearprof`. Without a profile name, all profiles are removed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearQuery {
    pub pn: Option<String>,
}
