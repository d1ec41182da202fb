use thiserror::Error;
use tungstenite::http::Uri;

use crate::event::{InvalidMatchId, MatchId};

/// Path prefix of the subscription endpoint.
pub const SUBSCRIBE_PATH: &str = "/ws/matches/";

/// What a viewer asked for in the upgrade request:
/// `/ws/matches/{match_id}?viewer={id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub match_id: MatchId,
    pub viewer: Option<String>,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no subscription endpoint at {0}")]
    UnknownPath(String),
    #[error(transparent)]
    InvalidMatchId(#[from] InvalidMatchId),
}

impl SubscriptionRequest {
    pub fn from_uri(uri: &Uri) -> Result<Self, RequestError> {
        let path = uri.path();
        let raw_id = path
            .strip_prefix(SUBSCRIBE_PATH)
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .ok_or_else(|| RequestError::UnknownPath(path.to_string()))?;

        let match_id = raw_id.parse::<MatchId>()?;
        let viewer = uri.query().and_then(viewer_from_query);

        Ok(Self { match_id, viewer })
    }
}

fn viewer_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "viewer")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
