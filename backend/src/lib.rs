pub mod catchers;
pub mod config;
pub mod cors;
pub mod error;
pub mod pages;
pub mod qr;
pub mod redis_store;
pub mod retry;
pub mod routes;
pub mod service;
pub mod store;
pub mod utils;
pub mod views;
pub use shared::{models::*, error::*, validation::*};

use rocket::{Build, Rocket, catchers, routes};

use cors::CORS;
use routes::AppState;

/// Assembles the HTTP surface: browser pages at `/`, JSON API at `/api`.
pub fn build_rocket(state: AppState, cors_origin: Option<String>) -> Rocket<Build> {
    rocket::build()
        .attach(CORS::new(cors_origin))
        .manage(state)
        .mount(
            "/",
            routes![
                pages::home,
                pages::create_survey,
                pages::survey_page,
                pages::survey_qr,
                pages::vote,
                pages::results,
                pages::health,
                pages::static_asset
            ],
        )
        .mount(
            "/api",
            routes![
                routes::create_survey,
                routes::list_surveys,
                routes::cast_vote,
                routes::get_results,
                routes::all_options
            ],
        )
        .register(
            "/",
            catchers![
                catchers::bad_request_page,
                catchers::not_found_page,
                catchers::unprocessable_page,
                catchers::internal_error_page
            ],
        )
        .register(
            "/api",
            catchers![
                catchers::bad_request,
                catchers::not_found,
                catchers::unprocessable,
                catchers::internal_error
            ],
        )
}

#[cfg(test)]
mod tests;
