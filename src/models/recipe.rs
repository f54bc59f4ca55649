use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::display_name;

/// A recipe row as stored in the local database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub image_path: String,
    pub source_file: String,
    pub is_favorite: bool,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    pub fn category_display_name(&self) -> &'static str {
        display_name(&self.category)
    }
}

/// A recipe as it appears in the bundled catalogue files.
///
/// Timestamps in catalogue records are ignored (generated files may carry
/// naive ones); the importer stamps every record right before it is written.
/// Other store-side fields such as `id`, `is_favorite` or `rating` are
/// ignored as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueRecipe {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub source_file: String,
    #[serde(skip, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(skip, default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CatalogueRecipe {
    pub fn stamped(self, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStat {
    pub category_id: String,
    pub category_name: String,
    pub recipe_count: i64,
    pub average_rating: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_recipe_fills_missing_fields() {
        let json = r#"{"title": "番茄炒蛋", "category": "stir_fry", "image_path": "../images/egg.jpg"}"#;
        let recipe: CatalogueRecipe = serde_json::from_str(json).unwrap();

        assert_eq!(recipe.title, "番茄炒蛋");
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.instructions.is_empty());
        assert_eq!(recipe.image_path, "../images/egg.jpg");
        assert_eq!(recipe.source_file, "");
    }

    #[test]
    fn catalogue_timestamps_and_store_fields_are_ignored() {
        let json = r#"{
            "id": 7,
            "title": "米饭",
            "category": "staple",
            "is_favorite": true,
            "rating": 4.0,
            "created_at": "2025-06-01T08:00:00.123456",
            "updated_at": "2025-06-01T08:00:00.123456"
        }"#;
        let recipe: CatalogueRecipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.title, "米饭");
        assert_eq!(recipe.category, "staple");
    }

    #[test]
    fn stamped_sets_both_timestamps() {
        let json = r#"{"title": "米饭", "category": "staple"}"#;
        let recipe: CatalogueRecipe = serde_json::from_str(json).unwrap();
        let now = DateTime::parse_from_rfc3339("2026-01-11T12:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);

        let recipe = recipe.stamped(now);
        assert_eq!(recipe.created_at, now);
        assert_eq!(recipe.updated_at, now);
    }
}
