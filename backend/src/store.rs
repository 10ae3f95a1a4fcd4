use std::collections::HashMap;
use std::sync::Mutex;

use shared::models::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The command never reached the store.
    #[error("Store connection failed: {0}")]
    Connection(String),
    /// The connection broke or timed out after the command was sent; it may
    /// or may not have been applied.
    #[error("Store reply lost: {0}")]
    Interrupted(String),
    #[error("Store command failed: {0}")]
    Command(String),
    #[error("Corrupt survey record {key}: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Failed to acquire store lock")]
    LockFailed,
}

impl StoreError {
    /// The store could not be reached or did not answer. Safe to retry for
    /// idempotent calls.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Interrupted(_))
    }

    /// The command certainly had no effect, so even a counter increment can
    /// be sent again.
    pub fn is_unsent(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

/// Persistence for surveys and their tallies.
///
/// Every mutation is a single atomic operation on the store side, so any
/// number of stateless replicas can share one store.
#[rocket::async_trait]
pub trait SurveyStore: Send + Sync {
    /// Persists `survey` with zero counts. Returns `false` and writes nothing
    /// when the id is already taken.
    async fn insert(&self, survey: &Survey) -> Result<bool, StoreError>;

    async fn fetch(&self, id: &SurveyId) -> Result<Option<SurveyResults>, StoreError>;

    /// Adds one vote for `choice` and returns the updated tally, or `None`
    /// if no such survey exists. Never creates a tally for a missing survey.
    async fn increment(&self, id: &SurveyId, choice: Choice) -> Result<Option<Tally>, StoreError>;

    /// Newest surveys first.
    async fn recent(&self, limit: usize) -> Result<Vec<Survey>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct Record {
    survey: Survey,
    tally: Tally,
}

/// In-process store. Only correct for a single replica; used by tests and
/// local runs without Redis.
#[derive(Debug, Default)]
pub struct MemoryStore {
    surveys: Mutex<HashMap<SurveyId, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl SurveyStore for MemoryStore {
    async fn insert(&self, survey: &Survey) -> Result<bool, StoreError> {
        let mut surveys = self.surveys.lock().map_err(|_| StoreError::LockFailed)?;
        if surveys.contains_key(&survey.id) {
            return Ok(false);
        }

        surveys.insert(survey.id.clone(), Record { survey: survey.clone(), tally: Tally::default() });
        Ok(true)
    }

    async fn fetch(&self, id: &SurveyId) -> Result<Option<SurveyResults>, StoreError> {
        let surveys = self.surveys.lock().map_err(|_| StoreError::LockFailed)?;
        Ok(surveys
            .get(id)
            .map(|record| SurveyResults::new(record.survey.clone(), record.tally)))
    }

    async fn increment(&self, id: &SurveyId, choice: Choice) -> Result<Option<Tally>, StoreError> {
        let mut surveys = self.surveys.lock().map_err(|_| StoreError::LockFailed)?;
        let Some(record) = surveys.get_mut(id) else { return Ok(None) };

        match choice {
            Choice::Yes => record.tally.yes += 1,
            Choice::No => record.tally.no += 1,
        }
        Ok(Some(record.tally))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Survey>, StoreError> {
        let surveys = self.surveys.lock().map_err(|_| StoreError::LockFailed)?;
        let mut listed: Vec<Survey> = surveys.values().map(|r| r.survey.clone()).collect();

        listed.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        listed.truncate(limit);
        Ok(listed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.surveys.lock().map(|_| ()).map_err(|_| StoreError::LockFailed)
    }
}
