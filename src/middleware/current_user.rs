use std::future::{ready, Ready};

use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};

pub const USER_HEADER: &str = "X-User-Id";
pub const DEFAULT_USER_ID: &str = "1";

/// The caller's user id, read from `X-User-Id`. There is no authentication;
/// requests without the header act as the default user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_USER_ID)
            .to_string();
        ready(Ok(CurrentUser { user_id }))
    }
}
