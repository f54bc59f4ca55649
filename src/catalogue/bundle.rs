use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::Result;
use crate::models::{CatalogueRecipe, SEASONING_CATEGORY};

use super::image::resolve_image_reference;

pub const METADATA_FILE: &str = "metadata.json";
pub const FLAT_CATALOGUE_FILE: &str = "cooklikehoc_recipes.json";
pub const CATEGORIES_DIR: &str = "categories";
pub const IMAGES_DIR: &str = "images";

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub import_time: Option<String>,
    #[serde(default)]
    pub total_recipes: Option<u64>,
    pub categories: Vec<String>,
}

/// Contents of one `categories/{key}_recipes.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryFile {
    pub category: String,
    pub count: i64,
    pub recipes: Vec<CatalogueRecipe>,
}

/// Read-only view of the bundled catalogue directory.
#[derive(Debug, Clone)]
pub struct Catalogue {
    root: PathBuf,
}

impl Catalogue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn category_file(key: &str) -> String {
        format!("{CATEGORIES_DIR}/{key}_recipes.json")
    }

    pub async fn read_metadata(&self) -> Result<CatalogueMetadata> {
        self.read_json(METADATA_FILE).await
    }

    pub async fn read_category(&self, key: &str) -> Result<CategoryFile> {
        self.read_json(&Self::category_file(key)).await
    }

    pub async fn read_flat(&self) -> Result<Vec<CatalogueRecipe>> {
        self.read_json(FLAT_CATALOGUE_FILE).await
    }

    pub async fn read_seasoning(&self) -> Result<Vec<CatalogueRecipe>> {
        Ok(self.read_category(SEASONING_CATEGORY).await?.recipes)
    }

    /// Absolute location of a recipe image, if the reference is usable.
    pub fn image_file(&self, reference: &str) -> Option<PathBuf> {
        resolve_image_reference(reference).map(|relative| self.root.join(relative))
    }

    async fn read_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T> {
        let path = self.root.join(relative);
        tracing::debug!("Reading catalogue file {}", path.display());
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
