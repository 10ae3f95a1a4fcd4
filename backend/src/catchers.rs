use rocket::{Request, catch, response::content::RawHtml, serde::json::Json};
use shared::{ErrorCode, ErrorResponse};

use crate::views;

// JSON catchers, registered under /api

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(ErrorCode::InvalidInput, "Invalid request parameters."))
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(ErrorCode::NotFound, "The requested resource was not found."))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(ErrorCode::InvalidInput, "Request body is malformed."))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(ErrorCode::SystemError, "An internal server error occurred."))
}

// HTML catchers for the browser-facing pages

#[catch(400)]
pub fn bad_request_page(_req: &Request) -> RawHtml<String> {
    RawHtml(views::error_page(400, "Invalid request parameters."))
}

#[catch(404)]
pub fn not_found_page(_req: &Request) -> RawHtml<String> {
    RawHtml(views::error_page(404, "Survey not found."))
}

#[catch(422)]
pub fn unprocessable_page(_req: &Request) -> RawHtml<String> {
    RawHtml(views::error_page(422, "The submitted form could not be read."))
}

#[catch(500)]
pub fn internal_error_page(_req: &Request) -> RawHtml<String> {
    RawHtml(views::error_page(500, "An internal server error occurred."))
}
