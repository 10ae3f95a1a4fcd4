use rocket::http::Status;
use rocket::response::{Responder, content::RawHtml};
use rocket::serde::json::Json;
use shared::{ErrorCode, ErrorResponse, ValidationError};
use thiserror::Error;
use tracing::error;

use crate::qr::QrError;
use crate::store::StoreError;
use crate::views;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Survey not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SurveyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SurveyError::NotFound(_) => ErrorCode::NotFound,
            SurveyError::InvalidInput(_) => ErrorCode::InvalidInput,
            SurveyError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            SurveyError::Internal(_) => ErrorCode::SystemError,
        }
    }

    pub fn status(&self) -> Status {
        Status::new(self.code().status_code())
    }

    /// Message safe to show to users; infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            SurveyError::NotFound(_) => "Survey not found.".into(),
            SurveyError::InvalidInput(msg) => msg.clone(),
            SurveyError::StoreUnavailable(_) => "The survey store is temporarily unavailable. Please try again.".into(),
            SurveyError::Internal(_) => "An internal server error occurred.".into(),
        }
    }

    fn log(&self) {
        if matches!(self, SurveyError::StoreUnavailable(_) | SurveyError::Internal(_)) {
            error!("Request failed: {}", self);
        }
    }
}

impl From<StoreError> for SurveyError {
    fn from(e: StoreError) -> Self {
        if e.is_transient() {
            SurveyError::StoreUnavailable(e)
        } else {
            SurveyError::Internal(e.to_string())
        }
    }
}

impl From<ValidationError> for SurveyError {
    fn from(e: ValidationError) -> Self {
        SurveyError::InvalidInput(e.to_string())
    }
}

impl From<QrError> for SurveyError {
    fn from(e: QrError) -> Self {
        SurveyError::InvalidInput(e.to_string())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for SurveyError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        self.log();
        let status = self.status();
        let body = ErrorResponse::new(self.code(), self.public_message());

        let mut response = rocket::Response::build_from(Json(body).respond_to(req)?);
        response.status(status);
        if status == Status::ServiceUnavailable {
            response.raw_header("Retry-After", "1");
        }
        response.ok()
    }
}

/// Same error rendered as a user-facing HTML page.
#[derive(Debug)]
pub struct HtmlError(pub SurveyError);

impl From<SurveyError> for HtmlError {
    fn from(e: SurveyError) -> Self {
        HtmlError(e)
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for HtmlError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let HtmlError(err) = self;
        err.log();
        let status = err.status();
        let page = views::error_page(status.code, &err.public_message());

        let mut response = rocket::Response::build_from(RawHtml(page).respond_to(req)?);
        response.status(status);
        if status == Status::ServiceUnavailable {
            response.raw_header("Retry-After", "1");
        }
        response.ok()
    }
}
