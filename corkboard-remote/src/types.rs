use corkboard::{BatchEntry, Card};
use serde::{Deserialize, Serialize};

/// Body of `POST /cards/batch`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest<'a> {
    pub entries: &'a [BatchEntry],
}

/// Body of `GET /cards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsResponse {
    pub cards: Vec<Card>,
}

/// Error body the API returns alongside non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
