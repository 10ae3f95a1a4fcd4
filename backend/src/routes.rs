use rocket::{State, get, post, http::Status, response::status, serde::json::Json};
use shared::models::*;
use shared::validation::ValidationError;
use tracing::instrument;

use crate::{
    config::Config,
    error::SurveyError,
    service::SurveyService,
    utils::{BaseUrl, path_survey_id},
};

/// Everything a replica keeps between requests: configuration and a handle
/// to the shared store. No per-user state lives here.
pub struct AppState {
    pub service: SurveyService,
    pub public_base_url: Option<String>,
    pub recent_limit: usize,
}

impl AppState {
    pub fn new(service: SurveyService, config: &Config) -> Self {
        Self {
            service,
            public_base_url: config.public_base_url.clone(),
            recent_limit: config.recent_limit,
        }
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[get("/surveys")]
pub async fn list_surveys(state: &State<AppState>) -> Result<Json<Vec<Survey>>, SurveyError> {
    state.service.recent_surveys(state.recent_limit).await.map(Json)
}

#[instrument(skip(state, base, request))]
#[post("/surveys", format = "json", data = "<request>")]
pub async fn create_survey(
    state: &State<AppState>,
    base: BaseUrl,
    request: Json<CreateSurveyRequest>,
) -> Result<status::Created<Json<CreateSurveyResponse>>, SurveyError> {
    let survey = state.service.create_survey(&request.question).await?;
    let vote_url = base.vote_url(&survey.id);

    let response = CreateSurveyResponse {
        results_url: base.results_url(&survey.id),
        vote_url: vote_url.clone(),
        id: survey.id,
        question: survey.question,
        created_at: survey.created_at,
    };
    Ok(status::Created::new(vote_url).body(Json(response)))
}

#[instrument(skip(state, id, request))]
#[post("/surveys/<id>/vote", format = "json", data = "<request>")]
pub async fn cast_vote(
    state: &State<AppState>,
    id: Result<SurveyId, ValidationError>,
    request: Json<VoteRequest>,
) -> Result<Json<VoteResponse>, SurveyError> {
    let id = path_survey_id(id)?;
    let tally = state.service.record_vote(&id, request.choice).await?;
    Ok(Json(VoteResponse::new(id, tally)))
}

#[get("/surveys/<id>/results")]
pub async fn get_results(
    state: &State<AppState>,
    id: Result<SurveyId, ValidationError>,
) -> Result<Json<SurveyResults>, SurveyError> {
    let id = path_survey_id(id)?;
    state.service.get_results(&id).await.map(Json)
}
