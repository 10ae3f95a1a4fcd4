use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::validation::{echo_input, ValidationError};

pub const MAX_SURVEY_ID_LENGTH: usize = 64;

/// Opaque survey identifier. Only the URL-safe base64 alphabet is accepted so
/// an id can be dropped into a path or a Redis key without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SurveyId(String);

impl SurveyId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SURVEY_ID_LENGTH
            && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidSurveyId(echo_input(raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SurveyId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SurveyId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SurveyId> for String {
    fn from(id: SurveyId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Yes,
    No,
}

impl Choice {
    pub const ALL: [Choice; 2] = [Choice::Yes, Choice::No];

    /// Name of the counter field this choice increments.
    pub const fn field(self) -> &'static str {
        match self {
            Choice::Yes => "yes",
            Choice::No => "no",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Choice::Yes => "Yes",
            Choice::No => "No",
        }
    }
}

impl FromStr for Choice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Choice::Yes),
            "no" => Ok(Choice::No),
            _ => Err(ValidationError::InvalidChoice(echo_input(s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: u64,
    pub no: u64,
}

impl Tally {
    pub fn new(yes: u64, no: u64) -> Self {
        Self { yes, no }
    }

    pub fn count(&self) -> u64 {
        self.yes + self.no
    }

    pub fn get(&self, choice: Choice) -> u64 {
        match choice {
            Choice::Yes => self.yes,
            Choice::No => self.no,
        }
    }

    /// Share of the total for `choice`, 0.0 when nobody has voted yet.
    pub fn percent(&self, choice: Choice) -> f64 {
        match self.count() {
            0 => 0.0,
            total => self.get(choice) as f64 / total as f64 * 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: SurveyId,
    pub question: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResults {
    pub id: SurveyId,
    pub question: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub yes: u64,
    pub no: u64,
    pub count: u64,
}

impl SurveyResults {
    pub fn new(survey: Survey, tally: Tally) -> Self {
        Self {
            id: survey.id,
            question: survey.question,
            created_at: survey.created_at,
            yes: tally.yes,
            no: tally.no,
            count: tally.count(),
        }
    }

    pub fn tally(&self) -> Tally {
        Tally::new(self.yes, self.no)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurveyRequest {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurveyResponse {
    pub id: SurveyId,
    pub question: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub vote_url: String,
    pub results_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub choice: Choice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub id: SurveyId,
    pub yes: u64,
    pub no: u64,
    pub count: u64,
}

impl VoteResponse {
    pub fn new(id: SurveyId, tally: Tally) -> Self {
        Self { id, yes: tally.yes, no: tally.no, count: tally.count() }
    }
}

// Backend-specific Rocket implementation
#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::form::{self, FromFormField, ValueField};
    use rocket::request::FromParam;

    impl<'a> FromParam<'a> for SurveyId {
        type Error = ValidationError;

        fn from_param(param: &'a str) -> Result<Self, Self::Error> {
            SurveyId::parse(param)
        }
    }

    impl<'v> FromFormField<'v> for Choice {
        fn from_value(field: ValueField<'v>) -> form::Result<'v, Self> {
            field
                .value
                .parse()
                .map_err(|e: ValidationError| form::Error::validation(e.to_string()).into())
        }
    }
}
