use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::catalogue::Catalogue;
use crate::error::{AppError, Result};
use crate::models::{CatalogueRecipe, Category, CategoryStat, Favorite, Rating, Recipe};

use super::live::{self, ChangeNotifier, LiveQuery};
use super::schema::{DROP_ALL, SCHEMA, SCHEMA_VERSION};

const RECIPE_COLUMNS: &str = "id, title, category, description, ingredients, instructions, \
     image_path, source_file, is_favorite, rating, created_at, updated_at";

const CATEGORY_COLUMNS: &str =
    "id, name, display_name, description, icon, sort_order, recipe_count";

/// Typed access to the local recipe store.
///
/// Cloning is cheap: clones share the same connection thread and change
/// notifier, so a write through any clone refreshes every live query.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
    changes: ChangeNotifier,
    catalogue: Catalogue,
}

impl Repository {
    pub async fn open(db_path: &str, catalogue: Catalogue) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::from_connection(conn, catalogue).await
    }

    #[cfg(test)]
    pub async fn open_in_memory(catalogue: Catalogue) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::from_connection(conn, catalogue).await
    }

    pub async fn from_connection(conn: Connection, catalogue: Catalogue) -> Result<Self> {
        conn.call(|conn| {
            prepare_schema(conn)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            changes: ChangeNotifier::new(),
            catalogue,
        })
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    // Recipe queries

    pub fn get_all_recipes(&self) -> LiveQuery<Recipe> {
        self.watch_recipes(
            format!("SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY title"),
            Vec::new(),
        )
    }

    pub async fn get_recipe_by_id(&self, id: i64) -> Result<Option<Recipe>> {
        let recipe = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"))?;
                let recipe = stmt.query_row(params![id], recipe_from_row).optional()?;
                Ok(recipe)
            })
            .await?;
        Ok(recipe)
    }

    pub fn get_recipes_by_category(&self, category: &str) -> LiveQuery<Recipe> {
        self.watch_recipes(
            format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE category = ?1 ORDER BY title"),
            vec![Value::Text(category.to_string())],
        )
    }

    /// Case-insensitive substring search over title, ingredients and
    /// instructions. Title matches rank first, then ingredient matches.
    pub fn search(&self, query: &str) -> LiveQuery<Recipe> {
        let query = query.trim();
        if query.is_empty() {
            return live::empty();
        }

        let pattern = format!("%{}%", escape_like(query));
        self.watch_recipes(
            format!(
                r#"SELECT {RECIPE_COLUMNS} FROM recipes
                   WHERE title LIKE ?1 ESCAPE '\'
                      OR ingredients LIKE ?1 ESCAPE '\'
                      OR instructions LIKE ?1 ESCAPE '\'
                   ORDER BY
                       CASE
                           WHEN title LIKE ?1 ESCAPE '\' THEN 1
                           WHEN ingredients LIKE ?1 ESCAPE '\' THEN 2
                           ELSE 3
                       END, title"#
            ),
            vec![Value::Text(pattern)],
        )
    }

    pub fn get_favorite_recipes(&self) -> LiveQuery<Recipe> {
        let columns = RECIPE_COLUMNS
            .split(", ")
            .map(|column| format!("r.{}", column.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        self.watch_recipes(
            format!(
                r#"SELECT {columns} FROM recipes r
                   INNER JOIN favorites f ON r.id = f.recipe_id
                   ORDER BY f.created_at DESC, f.id DESC"#
            ),
            Vec::new(),
        )
    }

    pub fn get_high_rated_recipes(&self, min_rating: f64) -> LiveQuery<Recipe> {
        self.watch_recipes(
            format!(
                "SELECT {RECIPE_COLUMNS} FROM recipes WHERE rating >= ?1 ORDER BY rating DESC, title"
            ),
            vec![Value::Real(min_rating)],
        )
    }

    pub fn get_top_rated_recipes(&self, limit: usize) -> LiveQuery<Recipe> {
        self.watch_recipes(
            format!("SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY rating DESC, title LIMIT ?1"),
            vec![limit_value(limit)],
        )
    }

    pub fn get_recent_recipes(&self, limit: usize) -> LiveQuery<Recipe> {
        self.watch_recipes(
            format!(
                "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY created_at DESC, id DESC LIMIT ?1"
            ),
            vec![limit_value(limit)],
        )
    }

    /// Fresh uniform sample on every call.
    pub async fn get_random_recipes(&self, limit: usize) -> Result<Vec<Recipe>> {
        self.query_recipes(
            format!("SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY RANDOM() LIMIT ?1"),
            vec![limit_value(limit)],
        )
        .await
    }

    pub async fn get_total_recipe_count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn get_category_stats(&self) -> Result<Vec<CategoryStat>> {
        let stats = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT category, category, COUNT(*), COALESCE(AVG(rating), 0)
                       FROM recipes
                       GROUP BY category
                       ORDER BY category"#,
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(CategoryStat {
                            category_id: row.get(0)?,
                            category_name: row.get(1)?,
                            recipe_count: row.get(2)?,
                            average_rating: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }

    // Category operations

    pub fn get_all_categories(&self) -> LiveQuery<Category> {
        let repo = self.clone();
        self.changes.watch(move || {
            let repo = repo.clone();
            async move { repo.fetch_categories().await }
        })
    }

    pub async fn get_category_by_id(&self, id: &str) -> Result<Option<Category>> {
        let id = id.to_string();
        let category = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"
                ))?;
                let category = stmt.query_row(params![id], category_from_row).optional()?;
                Ok(category)
            })
            .await?;
        Ok(category)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>> {
        let categories = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order ASC, id"
                ))?;
                let categories = stmt
                    .query_map([], category_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(categories)
            })
            .await?;
        Ok(categories)
    }

    // Bulk import writes

    /// Writes the whole category batch in one transaction, replacing rows
    /// with the same key.
    pub async fn insert_categories(&self, categories: Vec<Category>) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT OR REPLACE INTO categories
                           (id, name, display_name, description, icon, sort_order, recipe_count)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    )?;
                    for category in &categories {
                        stmt.execute(params![
                            category.id,
                            category.name,
                            category.display_name,
                            category.description,
                            category.icon,
                            category.sort_order,
                            category.recipe_count,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(categories.len())
            })
            .await?;

        self.changes.notify();
        Ok(inserted)
    }

    /// Writes the whole recipe batch in one transaction. Live queries see
    /// either none or all of the batch.
    pub async fn insert_recipes(&self, recipes: Vec<CatalogueRecipe>) -> Result<usize> {
        let rows = recipes
            .into_iter()
            .map(|recipe| {
                Ok((
                    serde_json::to_string(&recipe.ingredients)?,
                    serde_json::to_string(&recipe.instructions)?,
                    recipe,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO recipes
                           (title, category, description, ingredients, instructions,
                            image_path, source_file, is_favorite, rating, created_at, updated_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8, ?9)"#,
                    )?;
                    for (ingredients, instructions, recipe) in &rows {
                        stmt.execute(params![
                            recipe.title,
                            recipe.category,
                            recipe.description,
                            ingredients,
                            instructions,
                            recipe.image_path,
                            recipe.source_file,
                            timestamp(recipe.created_at),
                            timestamp(recipe.updated_at),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;

        self.changes.notify();
        Ok(inserted)
    }

    // Favorite operations

    /// Flips the favorite state of a recipe and returns the new state.
    ///
    /// The favorites row and the cached `is_favorite` flag change in one
    /// transaction.
    pub async fn toggle_favorite(&self, recipe_id: i64) -> Result<bool> {
        let now = timestamp(Utc::now());
        let toggled = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if !recipe_exists(&tx, recipe_id)? {
                    return Ok(None);
                }

                let was_favorite: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM favorites WHERE recipe_id = ?1)",
                    params![recipe_id],
                    |row| row.get(0),
                )?;

                if was_favorite {
                    tx.execute("DELETE FROM favorites WHERE recipe_id = ?1", params![recipe_id])?;
                } else {
                    tx.execute(
                        "INSERT INTO favorites (recipe_id, created_at) VALUES (?1, ?2)",
                        params![recipe_id, now],
                    )?;
                }

                tx.execute(
                    "UPDATE recipes SET is_favorite = ?1, updated_at = ?2 WHERE id = ?3",
                    params![!was_favorite, now, recipe_id],
                )?;
                tx.commit()?;
                Ok(Some(!was_favorite))
            })
            .await?;

        let is_favorite = toggled.ok_or(AppError::RecipeNotFound(recipe_id))?;
        self.changes.notify();
        tracing::debug!(recipe_id, is_favorite, "Toggled favorite");
        Ok(is_favorite)
    }

    pub async fn is_recipe_favorite(&self, recipe_id: i64) -> Result<bool> {
        let exists = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM favorites WHERE recipe_id = ?1)",
                    params![recipe_id],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    pub async fn get_favorite(&self, recipe_id: i64) -> Result<Option<Favorite>> {
        let favorite = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, recipe_id, created_at FROM favorites WHERE recipe_id = ?1",
                )?;
                let favorite = stmt
                    .query_row(params![recipe_id], |row| {
                        Ok(Favorite {
                            id: row.get(0)?,
                            recipe_id: row.get(1)?,
                            created_at: datetime_column(row, 2),
                        })
                    })
                    .optional()?;
                Ok(favorite)
            })
            .await?;
        Ok(favorite)
    }

    // Rating operations

    /// Records a rating and returns the recipe's new average.
    ///
    /// The rating row and the cached average change in one transaction.
    pub async fn rate_recipe(&self, recipe_id: i64, rating: f64, comment: &str) -> Result<f64> {
        if !rating.is_finite() {
            return Err(AppError::InvalidRating(rating));
        }

        let comment = comment.to_string();
        let now = timestamp(Utc::now());
        let average = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if !recipe_exists(&tx, recipe_id)? {
                    return Ok(None);
                }

                tx.execute(
                    "INSERT INTO ratings (recipe_id, rating, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![recipe_id, rating, comment, now],
                )?;
                let average = average_rating(&tx, recipe_id)?;
                tx.execute(
                    "UPDATE recipes SET rating = ?1, updated_at = ?2 WHERE id = ?3",
                    params![average, now, recipe_id],
                )?;
                tx.commit()?;
                Ok(Some(average))
            })
            .await?;

        let average = average.ok_or(AppError::RecipeNotFound(recipe_id))?;
        self.changes.notify();
        tracing::debug!(recipe_id, rating, average, "Rated recipe");
        Ok(average)
    }

    pub async fn get_average_rating(&self, recipe_id: i64) -> Result<f64> {
        let average = self
            .conn
            .call(move |conn| Ok(average_rating(conn, recipe_id)?))
            .await?;
        Ok(average)
    }

    pub fn get_ratings_by_recipe_id(&self, recipe_id: i64) -> LiveQuery<Rating> {
        let repo = self.clone();
        self.changes.watch(move || {
            let repo = repo.clone();
            async move { repo.fetch_ratings(recipe_id).await }
        })
    }

    async fn fetch_ratings(&self, recipe_id: i64) -> Result<Vec<Rating>> {
        let ratings = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, recipe_id, rating, comment, created_at FROM ratings
                       WHERE recipe_id = ?1
                       ORDER BY created_at DESC, id DESC"#,
                )?;
                let ratings = stmt
                    .query_map(params![recipe_id], |row| {
                        Ok(Rating {
                            id: row.get(0)?,
                            recipe_id: row.get(1)?,
                            rating: row.get(2)?,
                            comment: row.get(3)?,
                            created_at: datetime_column(row, 4),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ratings)
            })
            .await?;
        Ok(ratings)
    }

    // Maintenance

    /// Removes every rating, favorite, recipe and category in one transaction.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM ratings", [])?;
                tx.execute("DELETE FROM favorites", [])?;
                tx.execute("DELETE FROM recipes", [])?;
                tx.execute("DELETE FROM categories", [])?;
                tx.commit()?;
                Ok(())
            })
            .await?;

        self.changes.notify();
        tracing::info!("Cleared all recipe data");
        Ok(())
    }

    /// Seasoning recipes are never stored; they are read from the bundle on
    /// every call. Read failures yield an empty list.
    pub async fn get_seasoning_data(&self) -> Vec<CatalogueRecipe> {
        match self.catalogue.read_seasoning().await {
            Ok(recipes) => recipes,
            Err(e) => {
                tracing::error!("Failed to read seasoning data: {}", e);
                Vec::new()
            }
        }
    }

    // Helpers

    fn watch_recipes(&self, sql: String, values: Vec<Value>) -> LiveQuery<Recipe> {
        let repo = self.clone();
        self.changes.watch(move || {
            let repo = repo.clone();
            let sql = sql.clone();
            let values = values.clone();
            async move { repo.query_recipes(sql, values).await }
        })
    }

    async fn query_recipes(&self, sql: String, values: Vec<Value>) -> Result<Vec<Recipe>> {
        let recipes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let recipes = stmt
                    .query_map(params_from_iter(values.iter()), recipe_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(recipes)
            })
            .await?;
        Ok(recipes)
    }
}

fn prepare_schema(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version != SCHEMA_VERSION {
        if version != 0 {
            tracing::warn!(
                "Database schema version {} does not match {}, rebuilding empty",
                version,
                SCHEMA_VERSION
            );
        }
        conn.execute_batch(DROP_ALL)?;
    }

    conn.execute_batch(SCHEMA)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn recipe_exists(conn: &rusqlite::Connection, recipe_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM recipes WHERE id = ?1)",
        params![recipe_id],
        |row| row.get(0),
    )
}

fn average_rating(conn: &rusqlite::Connection, recipe_id: i64) -> rusqlite::Result<f64> {
    let average: Option<f64> = conn.query_row(
        "SELECT AVG(rating) FROM ratings WHERE recipe_id = ?1",
        params![recipe_id],
        |row| row.get(0),
    )?;
    Ok(average.unwrap_or(0.0))
}

/// Escapes LIKE wildcards so the query matches literally.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn limit_value(limit: usize) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56.000000Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_column(row: &Row, index: usize) -> DateTime<Utc> {
    let raw = row.get::<_, String>(index).ok();
    match raw.as_deref().and_then(parse_datetime) {
        Some(dt) => dt,
        None => {
            tracing::warn!(column = index, value = ?raw, "Unparsable timestamp, using now");
            Utc::now()
        }
    }
}

fn string_list(json: &str) -> Vec<String> {
    match serde_json::from_str(json) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Corrupt list column {:?}: {}", json, e);
            Vec::new()
        }
    }
}

fn recipe_from_row(row: &Row) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        ingredients: string_list(&row.get::<_, String>(4)?),
        instructions: string_list(&row.get::<_, String>(5)?),
        image_path: row.get(6)?,
        source_file: row.get(7)?,
        is_favorite: row.get::<_, i64>(8)? != 0,
        rating: row.get(9)?,
        created_at: datetime_column(row, 10),
        updated_at: datetime_column(row, 11),
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        icon: row.get(4)?,
        sort_order: row.get(5)?,
        recipe_count: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::tempdir;

    fn recipe(title: &str, category: &str, ingredients: &[&str]) -> CatalogueRecipe {
        CatalogueRecipe {
            title: title.to_string(),
            category: category.to_string(),
            description: String::new(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: vec![format!("Cook the {title}")],
            image_path: String::new(),
            source_file: format!("{category}/{title}.md"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn seeded() -> Repository {
        let repo = Repository::open_in_memory(Catalogue::new("missing-bundle"))
            .await
            .unwrap();
        repo.insert_recipes(vec![
            recipe("Braised pork", "braised", &["pork belly", "soy sauce"]),
            recipe("Tomato egg", "stir_fry", &["tomato", "egg"]),
            recipe("Pork dumplings", "staple", &["flour", "pork"]),
        ])
        .await
        .unwrap();
        repo
    }

    async fn id_of(repo: &Repository, title: &str) -> i64 {
        let all = repo.get_all_recipes().next().await.unwrap().unwrap();
        all.into_iter().find(|r| r.title == title).unwrap().id
    }

    async fn favorite_rows(repo: &Repository) -> i64 {
        repo.conn
            .call(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM favorites", [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn toggle_favorite_twice_restores_state() {
        let repo = seeded().await;
        let id = id_of(&repo, "Tomato egg").await;

        assert!(repo.toggle_favorite(id).await.unwrap());
        assert!(repo.is_recipe_favorite(id).await.unwrap());
        assert!(repo.get_recipe_by_id(id).await.unwrap().unwrap().is_favorite);
        assert!(repo.get_favorite(id).await.unwrap().is_some());

        assert!(!repo.toggle_favorite(id).await.unwrap());
        assert!(!repo.is_recipe_favorite(id).await.unwrap());
        assert!(!repo.get_recipe_by_id(id).await.unwrap().unwrap().is_favorite);
        assert_eq!(favorite_rows(&repo).await, 0);
    }

    #[tokio::test]
    async fn toggle_favorite_unknown_recipe_fails() {
        let repo = seeded().await;
        let err = repo.toggle_favorite(9999).await.unwrap_err();
        assert!(matches!(err, AppError::RecipeNotFound(9999)));
        assert_eq!(favorite_rows(&repo).await, 0);
    }

    #[tokio::test]
    async fn ratings_accumulate_into_mean() {
        let repo = seeded().await;
        let id = id_of(&repo, "Braised pork").await;

        for value in [5.0, 3.0, 4.5, 2.0] {
            repo.rate_recipe(id, value, "").await.unwrap();
        }

        let cached = repo.get_recipe_by_id(id).await.unwrap().unwrap().rating;
        assert!((cached - 3.625).abs() < 1e-9);
        assert!((repo.get_average_rating(id).await.unwrap() - 3.625).abs() < 1e-9);

        let ratings = repo.get_ratings_by_recipe_id(id).next().await.unwrap().unwrap();
        assert_eq!(ratings.len(), 4);
        assert!(ratings.iter().all(|r| r.recipe_id == id));
    }

    #[tokio::test]
    async fn unrated_recipe_averages_zero() {
        let repo = seeded().await;
        let id = id_of(&repo, "Tomato egg").await;
        assert_eq!(repo.get_average_rating(id).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn rejects_non_finite_rating() {
        let repo = seeded().await;
        let id = id_of(&repo, "Tomato egg").await;
        assert!(matches!(
            repo.rate_recipe(id, f64::NAN, "").await,
            Err(AppError::InvalidRating(_))
        ));
        assert!(matches!(
            repo.rate_recipe(4242, 4.0, "").await,
            Err(AppError::RecipeNotFound(4242))
        ));
    }

    #[tokio::test]
    async fn blank_search_is_empty() {
        let repo = seeded().await;
        let mut results = repo.search("   ");
        assert!(results.next().await.unwrap().unwrap().is_empty());
        assert!(results.next().await.is_none());
    }

    #[tokio::test]
    async fn search_ranks_title_matches_first() {
        let repo = seeded().await;
        let results = repo.search("PORK").next().await.unwrap().unwrap();
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();

        // Both titles contain "pork"; the ingredient-only match would follow them.
        assert_eq!(titles, vec!["Braised pork", "Pork dumplings"]);

        let results = repo.search("egg").next().await.unwrap().unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn search_title_match_beats_ingredient_match() {
        let repo = seeded().await;
        repo.insert_recipes(vec![
            recipe("Aaa soup", "soup", &["tofu"]),
            recipe("Tofu stew", "stew", &["cabbage"]),
        ])
        .await
        .unwrap();

        let results = repo.search("tofu").next().await.unwrap().unwrap();
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Tofu stew", "Aaa soup"]);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let repo = seeded().await;
        assert!(repo.search("%").next().await.unwrap().unwrap().is_empty());
        assert!(repo.search("_").next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_query_sees_writes() {
        let repo = seeded().await;
        let id = id_of(&repo, "Tomato egg").await;
        let mut favorites = repo.get_favorite_recipes();

        assert!(favorites.next().await.unwrap().unwrap().is_empty());

        repo.toggle_favorite(id).await.unwrap();
        let snapshot = favorites.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
        assert!(snapshot[0].is_favorite);
    }

    #[tokio::test]
    async fn random_sample_is_bounded_by_catalogue() {
        let repo = seeded().await;
        assert_eq!(repo.get_random_recipes(2).await.unwrap().len(), 2);
        assert_eq!(repo.get_random_recipes(50).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn top_rated_orders_by_rating_then_title() {
        let repo = seeded().await;
        let pork = id_of(&repo, "Braised pork").await;
        let egg = id_of(&repo, "Tomato egg").await;
        repo.rate_recipe(egg, 5.0, "great").await.unwrap();
        repo.rate_recipe(pork, 3.0, "").await.unwrap();

        let top = repo.get_top_rated_recipes(3).next().await.unwrap().unwrap();
        let titles: Vec<_> = top.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Tomato egg", "Braised pork", "Pork dumplings"]);

        let high = repo.get_high_rated_recipes(4.0).next().await.unwrap().unwrap();
        assert_eq!(high.len(), 1);
    }

    #[tokio::test]
    async fn recent_orders_by_creation_time() {
        let repo = Repository::open_in_memory(Catalogue::new("missing-bundle"))
            .await
            .unwrap();
        let older = Utc::now() - chrono::Duration::days(2);
        let newer = Utc::now();
        repo.insert_recipes(vec![
            recipe("Old", "soup", &[]).stamped(older),
            recipe("New", "soup", &[]).stamped(newer),
        ])
        .await
        .unwrap();

        let recent = repo.get_recent_recipes(1).next().await.unwrap().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "New");
    }

    #[tokio::test]
    async fn categories_and_stats() {
        let repo = seeded().await;
        repo.insert_categories(vec![
            Category::derived("stir_fry", 2, 1),
            Category::derived("braised", 1, 1),
        ])
        .await
        .unwrap();

        let categories = repo.get_all_categories().next().await.unwrap().unwrap();
        let ids: Vec<_> = categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["braised", "stir_fry"]);

        let category = repo.get_category_by_id("stir_fry").await.unwrap().unwrap();
        assert_eq!(category.display_name, "炒菜");
        assert!(repo.get_category_by_id("nope").await.unwrap().is_none());

        let stats = repo.get_category_stats().await.unwrap();
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.recipe_count == 1));
        assert!(stats.iter().all(|s| s.category_name == s.category_id));

        let by_category = repo.get_recipes_by_category("staple").next().await.unwrap().unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].ingredients, vec!["flour", "pork"]);
    }

    #[tokio::test]
    async fn clear_all_data_empties_every_table() {
        let repo = seeded().await;
        repo.insert_categories(vec![Category::derived("soup", 1, 0)])
            .await
            .unwrap();
        let id = id_of(&repo, "Tomato egg").await;
        repo.toggle_favorite(id).await.unwrap();
        repo.rate_recipe(id, 4.0, "").await.unwrap();

        repo.clear_all_data().await.unwrap();

        assert_eq!(repo.get_total_recipe_count().await.unwrap(), 0);
        assert_eq!(favorite_rows(&repo).await, 0);
        assert!(repo.get_all_categories().next().await.unwrap().unwrap().is_empty());
        assert!(repo.get_ratings_by_recipe_id(id).next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_version_mismatch_rebuilds_empty() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("recipes.db");
        let db_path = db_path.to_str().unwrap();

        let repo = Repository::open(db_path, Catalogue::new(dir.path())).await.unwrap();
        repo.insert_recipes(vec![recipe("Rice", "staple", &[])]).await.unwrap();
        repo.conn
            .call(|conn| {
                conn.pragma_update(None, "user_version", 1)?;
                Ok(())
            })
            .await
            .unwrap();
        drop(repo);

        let reopened = Repository::open(db_path, Catalogue::new(dir.path())).await.unwrap();
        assert_eq!(reopened.get_total_recipe_count().await.unwrap(), 0);

        // Same version keeps the data.
        reopened.insert_recipes(vec![recipe("Rice", "staple", &[])]).await.unwrap();
        drop(reopened);
        let again = Repository::open(db_path, Catalogue::new(dir.path())).await.unwrap();
        assert_eq!(again.get_total_recipe_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn seasoning_read_failure_is_empty() {
        let repo = seeded().await;
        assert!(repo.get_seasoning_data().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_row_still_loads() {
        let repo = seeded().await;
        let id = id_of(&repo, "Tomato egg").await;
        repo.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE recipes SET ingredients = 'oops', created_at = 'yesterday' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let before = Utc::now();
        let recipe = repo.get_recipe_by_id(id).await.unwrap().unwrap();
        assert!(recipe.ingredients.is_empty());
        assert_eq!(recipe.instructions, vec!["Cook the Tomato egg"]);
        assert!(recipe.created_at >= before);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("红烧肉"), "红烧肉");
    }
}
