use std::path::PathBuf;

use include_dir::{include_dir, Dir};
use rocket::form::Form;
use rocket::http::{ContentType, Header, Status};
use rocket::response::{content::RawHtml, status, Redirect};
use rocket::{FromForm, Responder, State, get, post};
use shared::models::*;
use shared::validation::ValidationError;
use tracing::instrument;

use crate::{
    error::{HtmlError, SurveyError},
    qr,
    routes::AppState,
    utils::{BaseUrl, path_survey_id},
    views,
};

static STATIC_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

#[derive(FromForm)]
pub struct QuestionForm {
    question: Option<String>,
}

#[derive(FromForm)]
pub struct VoteForm {
    choice: Option<Choice>,
}

/// HTML that browsers and intermediaries must not cache.
#[derive(Responder)]
pub struct NoStore {
    inner: RawHtml<String>,
    cache_control: Header<'static>,
    pragma: Header<'static>,
    expires: Header<'static>,
}

impl NoStore {
    fn new(html: String) -> Self {
        Self {
            inner: RawHtml(html),
            cache_control: Header::new("Cache-Control", "no-cache, no-store, must-revalidate"),
            pragma: Header::new("Pragma", "no-cache"),
            expires: Header::new("Expires", "0"),
        }
    }
}

fn qr_data_uri(url: &str) -> Result<String, SurveyError> {
    Ok(qr::data_uri(&qr::render_voting_qr(url)?))
}

#[get("/")]
pub async fn home(state: &State<AppState>) -> Result<NoStore, HtmlError> {
    let recent = state.service.recent_surveys(state.recent_limit).await?;
    Ok(NoStore::new(views::home_page(&recent)))
}

#[instrument(skip(state, base, form))]
#[post("/surveys", data = "<form>")]
pub async fn create_survey(
    state: &State<AppState>,
    base: BaseUrl,
    form: Form<QuestionForm>,
) -> Result<status::Created<RawHtml<String>>, HtmlError> {
    let question = form.into_inner().question.unwrap_or_default();
    let survey = state.service.create_survey(&question).await?;

    let vote_url = base.vote_url(&survey.id);
    let results_url = base.results_url(&survey.id);
    let page = views::created_page(&survey, &vote_url, &results_url, &qr_data_uri(&vote_url)?);

    Ok(status::Created::new(vote_url).body(RawHtml(page)))
}

#[get("/surveys/<id>")]
pub async fn survey_page(
    state: &State<AppState>,
    base: BaseUrl,
    id: Result<SurveyId, ValidationError>,
) -> Result<RawHtml<String>, HtmlError> {
    let id = path_survey_id(id)?;
    let survey = state.service.get_results(&id).await?;
    let vote_url = base.vote_url(&id);
    let qr = qr_data_uri(&vote_url)?;

    Ok(RawHtml(views::vote_page(&survey, &vote_url, &qr)))
}

#[get("/surveys/<id>/qr.png")]
pub async fn survey_qr(
    state: &State<AppState>,
    base: BaseUrl,
    id: Result<SurveyId, ValidationError>,
) -> Result<(ContentType, Vec<u8>), HtmlError> {
    let id = path_survey_id(id)?;
    state.service.get_results(&id).await?;
    let png = qr::render_voting_qr(&base.vote_url(&id)).map_err(SurveyError::from)?;
    Ok((ContentType::PNG, png))
}

#[instrument(skip(state, id, form))]
#[post("/surveys/<id>/vote", data = "<form>")]
pub async fn vote(
    state: &State<AppState>,
    id: Result<SurveyId, ValidationError>,
    form: Form<VoteForm>,
) -> Result<Redirect, HtmlError> {
    let id = path_survey_id(id)?;
    let choice = form
        .into_inner()
        .choice
        .ok_or_else(|| SurveyError::InvalidInput("Choose yes or no.".into()))?;
    state.service.record_vote(&id, choice).await?;

    // Post/Redirect/Get: refreshing the results page must not vote again.
    Ok(Redirect::to(format!("/surveys/{id}/results")))
}

#[get("/surveys/<id>/results")]
pub async fn results(state: &State<AppState>, id: Result<SurveyId, ValidationError>) -> Result<RawHtml<String>, HtmlError> {
    let id = path_survey_id(id)?;
    let results = state.service.get_results(&id).await?;
    Ok(RawHtml(views::results_page(&results)))
}

#[get("/health")]
pub async fn health(state: &State<AppState>) -> (Status, &'static str) {
    match state.service.health().await {
        Ok(()) => (Status::Ok, "ok"),
        Err(_) => (Status::ServiceUnavailable, "store unavailable"),
    }
}

#[get("/static/<path..>")]
pub fn static_asset(path: PathBuf) -> Option<(ContentType, &'static [u8])> {
    let file = STATIC_DIR.get_file(&path)?;
    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ContentType::from_extension)
        .unwrap_or(ContentType::Binary);

    Some((content_type, file.contents()))
}
