//! # Redis
//!
//! Shared store behind every replica.
//!
//! ## Layout
//!
//! - `survey:{id}`: hash with `question`, `created_at` (unix seconds), `yes`, `no`
//! - `surveys`: sorted set of ids scored by `created_at`, feeds the home page history
//!
//! ## Atomicity
//!
//! Creation and voting each run as one Lua script, so the existence check and
//! the write cannot interleave with another replica. Redis runs scripts one
//! at a time; counters therefore never lose updates and a vote can never
//! resurrect a tally for an unknown id.
//!
//! Durability is whatever the Redis deployment is configured for (see
//! `deploy/redis.conf`, append-only file on a mounted volume).
use std::collections::HashMap;

use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use shared::models::*;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::retry::{RetryPolicy, with_retry};
use crate::store::{StoreError, SurveyStore};

pub const SURVEY_INDEX_KEY: &str = "surveys";

const QUESTION_FIELD: &str = "question";
const CREATED_AT_FIELD: &str = "created_at";

// KEYS[1] survey hash, KEYS[2] index; ARGV id, question, created_at
const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'question', ARGV[2], 'created_at', ARGV[3], 'yes', 0, 'no', 0)
redis.call('ZADD', KEYS[2], ARGV[3], ARGV[1])
return 1
";

// KEYS[1] survey hash; ARGV[1] counter field
const VOTE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
return redis.call('HMGET', KEYS[1], 'yes', 'no')
";

pub fn survey_key(id: &SurveyId) -> String {
    format!("survey:{id}")
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_connection_refusal() {
            StoreError::Connection(e.to_string())
        } else if e.is_timeout() || e.is_connection_dropped() || e.is_io_error() {
            StoreError::Interrupted(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

pub struct RedisStore {
    connection: ConnectionManager,
    insert_script: Script,
    vote_script: Script,
}

impl RedisStore {
    /// Opens a managed connection, retrying with `policy` while Redis is
    /// still coming up.
    pub async fn connect(redis_url: &str, policy: &RetryPolicy) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| StoreError::Command(format!("invalid Redis URL: {e}")))?;

        let connection = with_retry(policy, "redis_connect", || {
            let client = client.clone();
            async move {
                let config = ConnectionManagerConfig::new().set_number_of_retries(1);
                client
                    .get_connection_manager_with_config(config)
                    .await
                    .map_err(StoreError::from)
            }
        })
        .await?;

        let store = Self::from_connection(connection);
        store.ping().await?;
        info!("Connected to Redis");

        Ok(store)
    }

    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            insert_script: Script::new(INSERT_SCRIPT),
            vote_script: Script::new(VOTE_SCRIPT),
        }
    }
}

fn parse_field<T: std::str::FromStr>(fields: &HashMap<String, String>, key: &str, field: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    let raw = fields.get(field).ok_or_else(|| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("missing field {field}"),
    })?;

    raw.parse().map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("bad {field}: {e}"),
    })
}

fn timestamp(key: &str, secs: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("bad created_at: {e}"),
    })
}

#[rocket::async_trait]
impl SurveyStore for RedisStore {
    async fn insert(&self, survey: &Survey) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let inserted: i64 = self
            .insert_script
            .key(survey_key(&survey.id))
            .key(SURVEY_INDEX_KEY)
            .arg(survey.id.as_str())
            .arg(&survey.question)
            .arg(survey.created_at.unix_timestamp())
            .invoke_async(&mut conn)
            .await?;

        Ok(inserted == 1)
    }

    async fn fetch(&self, id: &SurveyId) -> Result<Option<SurveyResults>, StoreError> {
        let key = survey_key(id);
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;

        if fields.is_empty() {
            return Ok(None);
        }

        let question: String = parse_field(&fields, &key, QUESTION_FIELD)?;
        let created_at = timestamp(&key, parse_field(&fields, &key, CREATED_AT_FIELD)?)?;
        let yes = parse_field(&fields, &key, Choice::Yes.field())?;
        let no = parse_field(&fields, &key, Choice::No.field())?;

        let survey = Survey { id: id.clone(), question, created_at };
        Ok(Some(SurveyResults::new(survey, Tally::new(yes, no))))
    }

    async fn increment(&self, id: &SurveyId, choice: Choice) -> Result<Option<Tally>, StoreError> {
        let mut conn = self.connection.clone();
        let counts: Option<(u64, u64)> = self
            .vote_script
            .key(survey_key(id))
            .arg(choice.field())
            .invoke_async(&mut conn)
            .await?;

        Ok(counts.map(|(yes, no)| Tally::new(yes, no)))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Survey>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let raw_ids: Vec<String> = conn.zrevrange(SURVEY_INDEX_KEY, 0, stop).await?;

        let ids: Vec<SurveyId> = raw_ids
            .iter()
            .filter_map(|raw| match SurveyId::parse(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(survey_id = %raw, "Malformed id in survey index, skipping");
                    None
                }
            })
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HMGET").arg(survey_key(id)).arg(QUESTION_FIELD).arg(CREATED_AT_FIELD);
        }
        let rows: Vec<(Option<String>, Option<i64>)> = pipe.query_async(&mut conn).await?;

        let mut surveys = Vec::with_capacity(ids.len());
        for (id, row) in ids.into_iter().zip(rows) {
            let (Some(question), Some(created_at)) = row else {
                warn!(survey_id = %id, "Indexed survey has no hash, skipping");
                continue;
            };
            let created_at = timestamp(&survey_key(&id), created_at)?;
            surveys.push(Survey { id, question, created_at });
        }

        Ok(surveys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
