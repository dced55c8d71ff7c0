use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::{movie, movie_rating};

/// An integer that clients may send either as a JSON number or as a string
/// holding one (`2020` and `"2020"` are both accepted).
#[derive(Clone, Debug, PartialEq)]
pub enum LenientInt {
    Int(i64),
    Invalid(String),
}

impl LenientInt {
    pub fn to_i32(&self, field: &str) -> Result<i32, String> {
        match self {
            LenientInt::Int(n) => {
                i32::try_from(*n).map_err(|_| format!("{field} is out of range"))
            },
            LenientInt::Invalid(raw) => Err(format!("{field} must be an integer, got {raw}")),
        }
    }
}

impl<'de> Deserialize<'de> for LenientInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => LenientInt::Int(i),
                None => LenientInt::Invalid(n.to_string()),
            },
            serde_json::Value::String(s) => match s.trim().parse() {
                Ok(i) => LenientInt::Int(i),
                Err(_) => LenientInt::Invalid(s),
            },
            other => LenientInt::Invalid(other.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NewUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewUserResponse {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct NewMovieRequest {
    pub name: Option<String>,
    pub year: Option<LenientInt>,
}

#[derive(Debug, Serialize)]
pub struct NewMovieResponse {
    pub id: i32,
    pub movie: String,
    pub year: i32,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub movie: String,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct MovieSummary {
    pub id: i32,
    pub name: String,
    pub year: Option<i32>,
}

impl From<movie::Model> for MovieSummary {
    fn from(m: movie::Model) -> Self {
        Self { id: m.id, name: m.name, year: m.year }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieList {
    #[serde(rename = "Movies")]
    pub movies: Vec<MovieSummary>,
}

/// Raw search parameters; integers are parsed by the handler so a malformed
/// value surfaces as invalid input instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub filter: Option<String>,
    pub year: Option<String>,
    pub top: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: Option<LenientInt>,
    pub review: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub name: String,
    pub rating: Option<i32>,
    pub review: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    pub avg: Option<String>,
    pub rates: Option<String>,
    pub reviews: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingEntry {
    #[serde(rename = "Rating")]
    pub rating: Option<i32>,
    #[serde(rename = "Review")]
    pub review: Option<String>,
}

impl From<movie_rating::Model> for RatingEntry {
    fn from(r: movie_rating::Model) -> Self {
        Self { rating: r.rating, review: r.review }
    }
}

#[derive(Debug, Serialize)]
pub enum RatingSummary {
    #[serde(rename = "Average rating")]
    Average(Option<f64>),
    #[serde(rename = "Number of rates")]
    Rates(u64),
    #[serde(rename = "Number of reviews")]
    Reviews(u64),
    #[serde(rename = "Ratings and reviews")]
    All(Vec<RatingEntry>),
}

#[derive(Debug, Serialize)]
pub struct MovieRatingsResponse {
    #[serde(rename = "Movie")]
    pub movie: String,
    #[serde(flatten)]
    pub summary: RatingSummary,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub movie: String,
    pub user: String,
    pub rating: Option<i32>,
    pub review: Option<String>,
}
