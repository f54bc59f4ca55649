use chrono::Utc;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{CatalogueRecipe, Category, SEASONING_CATEGORY};

use super::bundle::FLAT_CATALOGUE_FILE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResult {
    Success {
        recipe_count: usize,
        category_count: usize,
    },
    AlreadyImported {
        existing_count: i64,
    },
    Error {
        message: String,
    },
}

impl ImportResult {
    /// User-facing summary of an import run.
    pub fn into_message(self) -> Result<String> {
        match self {
            ImportResult::Success {
                recipe_count,
                category_count,
            } => Ok(format!(
                "Imported {recipe_count} recipes in {category_count} categories"
            )),
            ImportResult::AlreadyImported { existing_count } => Ok(format!(
                "Catalogue already imported ({existing_count} recipes), skipping"
            )),
            ImportResult::Error { message } => Err(AppError::Import(message)),
        }
    }
}

/// Populates an empty store from the bundled catalogue.
pub struct DataImporter {
    repository: Repository,
}

impl DataImporter {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Runs the import unless the store already holds recipes.
    ///
    /// Store failures are folded into `ImportResult::Error`, never returned
    /// as `Err`.
    pub async fn import_recipes(&self) -> ImportResult {
        match self.try_import().await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Recipe import failed: {}", e);
                ImportResult::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    pub async fn check_data_exists(&self) -> Result<bool> {
        Ok(self.repository.get_total_recipe_count().await? > 0)
    }

    pub async fn clear_all_data(&self) -> Result<String> {
        self.repository
            .clear_all_data()
            .await
            .map_err(|e| AppError::Other(anyhow::anyhow!("Failed to clear data: {}", e)))?;
        Ok("All recipe data cleared".to_string())
    }

    async fn try_import(&self) -> Result<ImportResult> {
        let existing_count = self.repository.get_total_recipe_count().await?;
        if existing_count > 0 {
            tracing::debug!("Store already holds {} recipes, skipping import", existing_count);
            return Ok(ImportResult::AlreadyImported { existing_count });
        }

        let (mut recipes, mut categories) = self.read_category_files().await;

        if recipes.is_empty() {
            tracing::warn!(
                "Per-category import produced no recipes, falling back to {}",
                FLAT_CATALOGUE_FILE
            );
            match self.read_flat_catalogue().await {
                Ok((flat_recipes, flat_categories)) if !flat_recipes.is_empty() => {
                    recipes = flat_recipes;
                    categories = flat_categories;
                }
                Ok(_) => {
                    return Ok(ImportResult::Error {
                        message: format!("{FLAT_CATALOGUE_FILE} contains no recipes"),
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to import {}: {}", FLAT_CATALOGUE_FILE, e);
                    return Ok(ImportResult::Error {
                        message: format!("Failed to import recipe data: {e}"),
                    });
                }
            }
        }

        let recipe_count = recipes.len();
        let category_count = categories.len();

        // The category batch is written on its own, whatever happens to the
        // recipe batch afterwards.
        if !categories.is_empty() {
            self.repository.insert_categories(categories).await?;
        }
        if !recipes.is_empty() {
            self.repository.insert_recipes(recipes).await?;
        }

        tracing::info!(
            "Imported {} recipes in {} categories",
            recipe_count,
            category_count
        );
        Ok(ImportResult::Success {
            recipe_count,
            category_count,
        })
    }

    /// Primary path: one file per category listed in the metadata. Files that
    /// fail to read or parse are skipped.
    async fn read_category_files(&self) -> (Vec<CatalogueRecipe>, Vec<Category>) {
        let catalogue = self.repository.catalogue();
        let mut recipes = Vec::new();
        let mut categories = Vec::new();

        let metadata = match catalogue.read_metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Failed to read catalogue metadata: {}", e);
                return (recipes, categories);
            }
        };

        tracing::debug!(
            source = ?metadata.source,
            import_time = ?metadata.import_time,
            total_recipes = ?metadata.total_recipes,
            "Read catalogue metadata listing {} categories",
            metadata.categories.len()
        );

        for (index, key) in metadata.categories.iter().enumerate() {
            if key == SEASONING_CATEGORY {
                tracing::debug!("Skipping reserved category {}", key);
                continue;
            }

            match catalogue.read_category(key).await {
                Ok(file) => {
                    let now = Utc::now();
                    tracing::debug!("Read {} recipes for category {}", file.recipes.len(), key);
                    recipes.extend(file.recipes.into_iter().map(|r| r.stamped(now)));
                    categories.push(Category::derived(
                        &file.category,
                        index as i64 + 1,
                        file.count,
                    ));
                }
                Err(e) => {
                    tracing::warn!("Failed to import category {}: {}", key, e);
                }
            }
        }

        (recipes, categories)
    }

    /// Fallback path: the flat catalogue, with categories derived by grouping
    /// in first-seen order.
    async fn read_flat_catalogue(&self) -> Result<(Vec<CatalogueRecipe>, Vec<Category>)> {
        let now = Utc::now();
        let recipes: Vec<CatalogueRecipe> = self
            .repository
            .catalogue()
            .read_flat()
            .await?
            .into_iter()
            .filter(|r| r.category != SEASONING_CATEGORY)
            .map(|r| r.stamped(now))
            .collect();

        let mut groups: Vec<(&str, i64)> = Vec::new();
        for recipe in &recipes {
            match groups.iter_mut().find(|(key, _)| *key == recipe.category) {
                Some((_, count)) => *count += 1,
                None => groups.push((recipe.category.as_str(), 1)),
            }
        }

        let categories = groups
            .iter()
            .enumerate()
            .map(|(index, (key, count))| Category::derived(key, index as i64 + 1, *count))
            .collect();

        Ok((recipes, categories))
    }
}
