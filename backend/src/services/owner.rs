//! Caller identity. The gateway in front of the service authenticates the
//! user and forwards the owner id in `X-Owner-Id`.

use crate::error::ImportError;
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use regex::Regex;
use std::future::{ready, Ready};
use std::sync::OnceLock;

pub const OWNER_HEADER: &str = "X-Owner-Id";

/// Owner ids double as storage prefixes, so they are restricted to a safe
/// alphabet.
fn owner_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").ok())
        .as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn owner_from(req: &HttpRequest) -> Result<OwnerId, ImportError> {
    let value = req
        .headers()
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ImportError::Unauthorized)?;
    if owner_re().is_some_and(|re| re.is_match(value)) {
        Ok(OwnerId(value.to_string()))
    } else {
        Err(ImportError::Unauthorized)
    }
}

impl FromRequest for OwnerId {
    type Error = ImportError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(owner_from(req))
    }
}
