use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use shared::models::SurveyId;
use shared::validation::ValidationError;

use crate::error::SurveyError;
use crate::routes::AppState;

/// A path segment that is not a well-formed id cannot name a survey.
pub fn path_survey_id(param: Result<SurveyId, ValidationError>) -> Result<SurveyId, SurveyError> {
    param.map_err(|e| match e {
        ValidationError::InvalidSurveyId(raw) => SurveyError::NotFound(raw),
        other => SurveyError::NotFound(other.to_string()),
    })
}

/// Scheme and host clients used to reach us, e.g. `https://vote.example.com`.
///
/// `PUBLIC_BASE_URL` wins when configured. Otherwise the proxy's
/// `X-Forwarded-*` headers are trusted, then `Host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(pub String);

impl BaseUrl {
    pub fn vote_url(&self, id: &SurveyId) -> String {
        format!("{}/surveys/{}", self.0, id)
    }

    pub fn results_url(&self, id: &SurveyId) -> String {
        format!("{}/surveys/{}/results", self.0, id)
    }
}

fn first_value(header: &str) -> &str {
    header.split(',').next().unwrap_or(header).trim()
}

fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b':' | b'[' | b']'))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BaseUrl {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if let Some(url) = req.rocket().state::<AppState>().and_then(|s| s.public_base_url.as_deref()) {
            return Outcome::Success(BaseUrl(url.to_string()));
        }

        let headers = req.headers();
        let scheme = headers
            .get_one("X-Forwarded-Proto")
            .map(first_value)
            .filter(|p| matches!(*p, "http" | "https"))
            .unwrap_or("http");
        let host = headers
            .get_one("X-Forwarded-Host")
            .or_else(|| headers.get_one("Host"))
            .map(first_value)
            .filter(|h| is_valid_host(h))
            .unwrap_or("localhost");

        Outcome::Success(BaseUrl(format!("{scheme}://{host}")))
    }
}
