use std::sync::Arc;
use std::time::Duration;

use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use shared::models::*;
use shared::{ErrorCode, ErrorResponse};

use crate::{
    build_rocket,
    qr,
    retry::RetryPolicy,
    routes::AppState,
    service::SurveyService,
    store::{MemoryStore, StoreError, SurveyStore},
};

/// A store whose backend never answers.
struct DownStore;

#[rocket::async_trait]
impl SurveyStore for DownStore {
    async fn insert(&self, _survey: &Survey) -> Result<bool, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn fetch(&self, _id: &SurveyId) -> Result<Option<SurveyResults>, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn increment(&self, _id: &SurveyId, _choice: Choice) -> Result<Option<Tally>, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<Survey>, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }
}

async fn client_with(store: Arc<dyn SurveyStore>, public_base_url: Option<&str>) -> Client {
    let policy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    let state = AppState {
        service: SurveyService::new(store, policy),
        public_base_url: public_base_url.map(str::to_string),
        recent_limit: 10,
    };

    Client::tracked(build_rocket(state, None)).await.expect("valid rocket instance")
}

async fn client() -> Client {
    client_with(Arc::new(MemoryStore::new()), None).await
}

async fn create_via_api(client: &Client, question: &str) -> CreateSurveyResponse {
    let response = client
        .post("/api/surveys")
        .header(ContentType::JSON)
        .body(format!(r#"{{"question": {}}}"#, serde_json::to_string(question).unwrap()))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Created);
    response.into_json().await.expect("create response body")
}

async fn vote_via_form(client: &Client, id: &SurveyId, choice: &str) {
    let response = client
        .post(format!("/surveys/{id}/vote"))
        .header(ContentType::Form)
        .body(format!("choice={choice}"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(
        response.headers().get_one("Location"),
        Some(format!("/surveys/{id}/results").as_str())
    );
}

#[rocket::async_test]
async fn test_pizza_or_burgers_scenario() {
    let client = client().await;
    let created = create_via_api(&client, "Pizza or Burgers?").await;
    let id = created.id.clone();

    assert_eq!(created.vote_url, format!("http://localhost/surveys/{id}"));
    assert_eq!(created.results_url, format!("http://localhost/surveys/{id}/results"));

    let page = client.get(format!("/surveys/{id}")).dispatch().await;
    assert_eq!(page.status(), Status::Ok);
    assert_eq!(page.content_type(), Some(ContentType::HTML));
    let html = page.into_string().await.unwrap();

    let expected_qr = qr::data_uri(&qr::render_voting_qr(&created.vote_url).unwrap());
    assert!(html.contains(&expected_qr), "page embeds the QR code of the voting URL");
    assert!(html.contains(&created.vote_url));
    assert!(html.contains("Pizza or Burgers?"));

    vote_via_form(&client, &id, "yes").await;
    vote_via_form(&client, &id, "no").await;

    let results = client.get(format!("/api/surveys/{id}/results")).dispatch().await;
    assert_eq!(results.status(), Status::Ok);
    let results: SurveyResults = results.into_json().await.unwrap();
    assert_eq!(results.question, "Pizza or Burgers?");
    assert_eq!(results.count, 2);
    assert_eq!(results.tally(), Tally::new(1, 1));

    let html = client.get(format!("/surveys/{id}/results")).dispatch().await.into_string().await.unwrap();
    assert!(html.contains("Total votes: <strong>2</strong>"));
}

#[rocket::async_test]
async fn test_unknown_survey_is_404() {
    let client = client().await;

    let html = client.get("/surveys/doesnotexist/results").dispatch().await;
    assert_eq!(html.status(), Status::NotFound);
    assert!(html.into_string().await.unwrap().contains("Survey not found."));

    let api = client.get("/api/surveys/doesnotexist/results").dispatch().await;
    assert_eq!(api.status(), Status::NotFound);
    let body: ErrorResponse = api.into_json().await.unwrap();
    assert_eq!(body.code, ErrorCode::NotFound);

    let vote = client
        .post("/api/surveys/doesnotexist/vote")
        .header(ContentType::JSON)
        .body(r#"{"choice": "yes"}"#)
        .dispatch()
        .await;
    assert_eq!(vote.status(), Status::NotFound);

    let page = client.get("/surveys/doesnotexist").dispatch().await;
    assert_eq!(page.status(), Status::NotFound);
}

#[rocket::async_test]
async fn test_malformed_ids_are_404() {
    let client = client().await;

    let too_long = "a".repeat(shared::MAX_SURVEY_ID_LENGTH + 1);
    for path in [
        "/surveys/not%20an%20id".to_string(),
        "/surveys/not%20an%20id/results".to_string(),
        "/surveys/survey:1/qr.png".to_string(),
        format!("/surveys/{too_long}/results"),
    ] {
        let response = client.get(path.as_str()).dispatch().await;
        assert_eq!(response.status(), Status::NotFound, "{path}");
        assert!(response.into_string().await.unwrap().contains("Survey not found."), "{path}");
    }

    let api = client.get("/api/surveys/survey:1/results").dispatch().await;
    assert_eq!(api.status(), Status::NotFound);
    let body: ErrorResponse = api.into_json().await.unwrap();
    assert_eq!(body.code, ErrorCode::NotFound);

    let form_vote = client
        .post("/surveys/not%20an%20id/vote")
        .header(ContentType::Form)
        .body("choice=yes")
        .dispatch()
        .await;
    assert_eq!(form_vote.status(), Status::NotFound);

    let api_vote = client
        .post("/api/surveys/survey:1/vote")
        .header(ContentType::JSON)
        .body(r#"{"choice": "yes"}"#)
        .dispatch()
        .await;
    assert_eq!(api_vote.status(), Status::NotFound);
}

#[rocket::async_test]
async fn test_form_creation_renders_qr() {
    let client = client().await;
    let response = client
        .post("/surveys")
        .header(ContentType::Form)
        .header(Header::new("Host", "vote.example.com"))
        .header(Header::new("X-Forwarded-Proto", "https"))
        .body("question=Tea+or+coffee%3F")
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Created);
    let location = response.headers().get_one("Location").unwrap().to_string();
    assert!(location.starts_with("https://vote.example.com/surveys/"));

    let html = response.into_string().await.unwrap();
    assert!(html.contains("Tea or coffee?"));
    assert!(html.contains(&qr::data_uri(&qr::render_voting_qr(&location).unwrap())));

    let id = location.rsplit('/').next().unwrap();
    let qr_png = client
        .get(format!("/surveys/{id}/qr.png"))
        .header(Header::new("Host", "vote.example.com"))
        .header(Header::new("X-Forwarded-Proto", "https"))
        .dispatch()
        .await;
    assert_eq!(qr_png.status(), Status::Ok);
    assert_eq!(qr_png.content_type(), Some(ContentType::PNG));
    assert_eq!(qr_png.into_bytes().await.unwrap(), qr::render_voting_qr(&location).unwrap());

    let local = client.get(format!("/surveys/{id}/qr.png")).dispatch().await;
    assert_eq!(
        local.into_bytes().await.unwrap(),
        qr::render_voting_qr(&format!("http://localhost/surveys/{id}")).unwrap()
    );
}

#[rocket::async_test]
async fn test_public_base_url_overrides_headers() {
    let client = client_with(Arc::new(MemoryStore::new()), Some("https://survey.example.org")).await;
    let response = client
        .post("/api/surveys")
        .header(ContentType::JSON)
        .header(Header::new("Host", "internal-replica:8000"))
        .body(r#"{"question": "Which port?"}"#)
        .dispatch()
        .await;

    let created: CreateSurveyResponse = response.into_json().await.unwrap();
    assert_eq!(created.vote_url, format!("https://survey.example.org/surveys/{}", created.id));
}

#[rocket::async_test]
async fn test_invalid_input_is_400() {
    let client = client().await;

    let api = client
        .post("/api/surveys")
        .header(ContentType::JSON)
        .body(r#"{"question": "   "}"#)
        .dispatch()
        .await;
    assert_eq!(api.status(), Status::BadRequest);
    let body: ErrorResponse = api.into_json().await.unwrap();
    assert_eq!(body.code, ErrorCode::InvalidInput);

    let form = client.post("/surveys").header(ContentType::Form).body("").dispatch().await;
    assert_eq!(form.status(), Status::BadRequest);

    let created = create_via_api(&client, "Valid?").await;
    let bad_choice = client
        .post(format!("/surveys/{}/vote", created.id))
        .header(ContentType::Form)
        .body("choice=maybe")
        .dispatch()
        .await;
    assert_eq!(bad_choice.status(), Status::BadRequest);

    let results: SurveyResults = client
        .get(format!("/api/surveys/{}/results", created.id))
        .dispatch()
        .await
        .into_json()
        .await
        .unwrap();
    assert_eq!(results.count, 0, "rejected votes are not counted");
}

#[rocket::async_test]
async fn test_api_vote_returns_tally() {
    let client = client().await;
    let created = create_via_api(&client, "Cats or dogs?").await;

    for (choice, expected) in [("yes", 1), ("yes", 2), ("no", 3)] {
        let response = client
            .post(format!("/api/surveys/{}/vote", created.id))
            .header(ContentType::JSON)
            .body(format!(r#"{{"choice": "{choice}"}}"#))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let vote: VoteResponse = response.into_json().await.unwrap();
        assert_eq!(vote.count, expected);
    }
}

#[rocket::async_test]
async fn test_home_lists_recent_surveys() {
    let client = client().await;
    let first = create_via_api(&client, "First question?").await;
    create_via_api(&client, "Second <b>question</b>?").await;

    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.headers().get_one("Cache-Control"),
        Some("no-cache, no-store, must-revalidate")
    );
    let html = response.into_string().await.unwrap();
    assert!(html.contains(&format!("/surveys/{}", first.id)));
    assert!(html.contains("Second &lt;b&gt;question&lt;/b&gt;?"));

    let listed: Vec<Survey> = client.get("/api/surveys").dispatch().await.into_json().await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[rocket::async_test]
async fn test_store_down_is_503() {
    let client = client_with(Arc::new(DownStore), None).await;

    let page = client.get("/surveys/abc123/results").dispatch().await;
    assert_eq!(page.status(), Status::ServiceUnavailable);
    assert_eq!(page.headers().get_one("Retry-After"), Some("1"));

    let api = client
        .post("/api/surveys")
        .header(ContentType::JSON)
        .body(r#"{"question": "Anyone?"}"#)
        .dispatch()
        .await;
    assert_eq!(api.status(), Status::ServiceUnavailable);
    let body: ErrorResponse = api.into_json().await.unwrap();
    assert_eq!(body.code, ErrorCode::StoreUnavailable);
    assert!(!body.error.contains("refused"), "infrastructure details are not leaked");

    assert_eq!(client.get("/health").dispatch().await.status(), Status::ServiceUnavailable);
}

#[rocket::async_test]
async fn test_health_and_static() {
    let client = client().await;

    let health = client.get("/health").dispatch().await;
    assert_eq!(health.status(), Status::Ok);
    assert_eq!(health.into_string().await.unwrap(), "ok");

    let css = client.get("/static/style.css").dispatch().await;
    assert_eq!(css.status(), Status::Ok);
    assert_eq!(css.content_type(), Some(ContentType::CSS));

    assert_eq!(client.get("/static/missing.css").dispatch().await.status(), Status::NotFound);
}
