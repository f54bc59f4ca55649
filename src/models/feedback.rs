use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub recipe_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub recipe_id: i64,
    pub rating: f64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
