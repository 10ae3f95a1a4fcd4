use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use rustrict::CensorStr;
use shared::models::*;
use shared::validation::validate_question;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use crate::error::SurveyError;
use crate::retry::{RetryPolicy, with_retry, with_retry_unsent};
use crate::store::SurveyStore;

/// Random bytes per survey id; 12 bytes encode to 16 URL-safe characters.
pub const SURVEY_ID_BYTES: usize = 12;
const MAX_ID_ATTEMPTS: u32 = 3;
const INAPPROPRIATE_QUESTION: &str = "Question contains inappropriate language.";

pub struct SurveyService {
    store: Arc<dyn SurveyStore>,
    retry: RetryPolicy,
    rng: SystemRandom,
}

impl SurveyService {
    pub fn new(store: Arc<dyn SurveyStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            rng: SystemRandom::new(),
        }
    }

    fn generate_id(&self) -> Result<SurveyId, SurveyError> {
        let mut bytes = [0u8; SURVEY_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| SurveyError::Internal("system random source failed".into()))?;

        SurveyId::parse(&URL_SAFE_NO_PAD.encode(bytes)).map_err(|e| SurveyError::Internal(e.to_string()))
    }

    /// Validates `question` and stores a new survey with an empty tally.
    #[instrument(skip(self, question))]
    pub async fn create_survey(&self, question: &str) -> Result<Survey, SurveyError> {
        let question = validate_question(question)?;
        if question.is_inappropriate() {
            return Err(SurveyError::InvalidInput(INAPPROPRIATE_QUESTION.into()));
        }

        // The store keeps whole seconds.
        let now = OffsetDateTime::now_utc();
        let created_at = now - Duration::nanoseconds(i64::from(now.nanosecond()));

        for _ in 0..MAX_ID_ATTEMPTS {
            let survey = Survey {
                id: self.generate_id()?,
                question: question.clone(),
                created_at,
            };

            if with_retry(&self.retry, "insert", || self.store.insert(&survey)).await? {
                info!(survey_id = %survey.id, "Survey created");
                return Ok(survey);
            }
            warn!(survey_id = %survey.id, "Survey id already taken, drawing another");
        }

        Err(SurveyError::Internal("could not allocate a unique survey id".into()))
    }

    /// Counts one vote and returns the tally including it.
    ///
    /// A vote is counted at most once: when the reply is lost the caller gets
    /// `StoreUnavailable` and the increment is not sent again.
    #[instrument(skip(self, id), fields(survey_id = %id))]
    pub async fn record_vote(&self, id: &SurveyId, choice: Choice) -> Result<Tally, SurveyError> {
        let tally = with_retry_unsent(&self.retry, "increment", || self.store.increment(id, choice))
            .await?
            .ok_or_else(|| SurveyError::NotFound(id.to_string()))?;

        debug!(count = tally.count(), "Vote recorded");
        Ok(tally)
    }

    #[instrument(skip(self, id), fields(survey_id = %id))]
    pub async fn get_results(&self, id: &SurveyId) -> Result<SurveyResults, SurveyError> {
        with_retry(&self.retry, "fetch", || self.store.fetch(id))
            .await?
            .ok_or_else(|| SurveyError::NotFound(id.to_string()))
    }

    pub async fn recent_surveys(&self, limit: usize) -> Result<Vec<Survey>, SurveyError> {
        Ok(with_retry(&self.retry, "recent", || self.store.recent(limit)).await?)
    }

    /// Single ping, no retry: the load balancer does its own polling.
    pub async fn health(&self) -> Result<(), SurveyError> {
        Ok(self.store.ping().await?)
    }
}
