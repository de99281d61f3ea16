pub mod api;
pub mod plots;
pub mod ws;

use axum::http::HeaderMap;
use plotcanvas_shared::UserId;
use serde::Deserialize;

use crate::config::MAX_USER_ID_CHARS;

pub const USER_HEADER: &str = "x-user-id";

/// `?user=` fallback for callers that cannot set headers (WebSocket upgrades).
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

/// Development identity: the `x-user-id` header, else the `user` query
/// parameter. Blank or oversized ids count as signed out.
pub fn caller(headers: &HeaderMap, query: &UserQuery) -> Option<UserId> {
    let from_header = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok());
    from_header
        .or(query.user.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.chars().count() <= MAX_USER_ID_CHARS)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static(" ada "));
        let query = UserQuery {
            user: Some("bob".to_string()),
        };
        assert_eq!(caller(&headers, &query), Some("ada".to_string()));
        assert_eq!(caller(&HeaderMap::new(), &query), Some("bob".to_string()));
    }

    #[test]
    fn blank_or_long_ids_are_anonymous() {
        let blank = UserQuery {
            user: Some("  ".to_string()),
        };
        assert_eq!(caller(&HeaderMap::new(), &blank), None);
        let long = UserQuery {
            user: Some("x".repeat(MAX_USER_ID_CHARS + 1)),
        };
        assert_eq!(caller(&HeaderMap::new(), &long), None);
        assert_eq!(caller(&HeaderMap::new(), &UserQuery::default()), None);
    }
}
