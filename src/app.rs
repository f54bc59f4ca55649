use futures::StreamExt;
use tokio::sync::mpsc;

use crate::catalogue::{Catalogue, DataImporter, ImportResult};
use crate::cli::{Command, WatchTarget};
use crate::config::Config;
use crate::db::{LiveQuery, Repository};
use crate::error::{AppError, Result};
use crate::models::{display_name, CatalogueRecipe, Category, Favorite, Recipe};

pub struct App {
    pub repository: Repository,
    config: Config,

    // Background import state
    import_rx: mpsc::Receiver<ImportResult>,
    import_result: Option<ImportResult>,
}

impl App {
    /// Opens the store and starts the one-time catalogue import on a
    /// background task.
    pub async fn new(config: &Config) -> Result<Self> {
        let catalogue = Catalogue::new(config.catalogue_dir.clone());
        let repository = Repository::open(&config.db_path, catalogue).await?;

        let (import_tx, import_rx) = mpsc::channel(1);
        let importer = DataImporter::new(repository.clone());
        tokio::spawn(async move {
            let result = importer.import_recipes().await;
            let _ = import_tx.send(result).await;
        });

        Ok(Self {
            repository,
            config: config.clone(),
            import_rx,
            import_result: None,
        })
    }

    /// Poll for the import result (non-blocking)
    pub fn poll_import_result(&mut self) -> Option<ImportResult> {
        if self.import_result.is_none() {
            if let Ok(result) = self.import_rx.try_recv() {
                self.import_result = Some(result);
            }
        }
        self.import_result.clone()
    }

    pub async fn wait_for_import(&mut self) -> Result<ImportResult> {
        if let Some(result) = self.poll_import_result() {
            return Ok(result);
        }

        let result = self
            .import_rx
            .recv()
            .await
            .ok_or_else(|| AppError::Import("import task ended without a result".to_string()))?;
        self.import_result = Some(result.clone());
        Ok(result)
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        let import = self.wait_for_import().await?;

        match command {
            Command::Import => match import.into_message() {
                Ok(message) => println!("{message}"),
                Err(e) => eprintln!("{e}"),
            },

            Command::Clear => {
                let message = DataImporter::new(self.repository.clone())
                    .clear_all_data()
                    .await?;
                println!("{message}");
            }

            Command::Home => {
                let importer = DataImporter::new(self.repository.clone());
                if !importer.check_data_exists().await? {
                    println!("The recipe store is empty; check the catalogue directory");
                    return Ok(());
                }

                let random = self
                    .repository
                    .get_random_recipes(self.config.random_count)
                    .await?;
                print_section("Random picks", &random);

                let top = first_snapshot(
                    self.repository
                        .get_top_rated_recipes(self.config.top_rated_count),
                )
                .await?;
                print_section("Top rated", &top);

                let recent =
                    first_snapshot(self.repository.get_recent_recipes(self.config.recent_count))
                        .await?;
                print_section("Recently added", &recent);
            }

            Command::List { category } => {
                let recipes = match category {
                    Some(category) => {
                        first_snapshot(self.repository.get_recipes_by_category(&category)).await?
                    }
                    None => first_snapshot(self.repository.get_all_recipes()).await?,
                };
                print_recipes(&recipes);
            }

            Command::Show { id } => {
                let recipe = self
                    .repository
                    .get_recipe_by_id(id)
                    .await?
                    .ok_or(AppError::RecipeNotFound(id))?;
                let category = self.repository.get_category_by_id(&recipe.category).await?;
                let favorite = self.repository.get_favorite(id).await?;
                self.print_recipe_detail(&recipe, category.as_ref(), favorite.as_ref());
            }

            Command::Search { query } => {
                let recipes = first_snapshot(self.repository.search(&query)).await?;
                print_recipes(&recipes);
            }

            Command::Favorite { id } => {
                let is_favorite = self.repository.toggle_favorite(id).await?;
                if is_favorite {
                    println!("Recipe {id} added to favorites");
                } else {
                    println!("Recipe {id} removed from favorites");
                }
            }

            Command::Favorites => {
                let recipes = first_snapshot(self.repository.get_favorite_recipes()).await?;
                print_recipes(&recipes);
            }

            Command::Rate { id, value, comment } => {
                let average = self.repository.rate_recipe(id, value, &comment).await?;
                println!("Rated recipe {id}: {value:.1} (average now {average:.2})");
            }

            Command::Ratings { id } => {
                let average = self.repository.get_average_rating(id).await?;
                let favorite = self.repository.is_recipe_favorite(id).await?;
                println!(
                    "Recipe {id}: average {average:.2}{}",
                    if favorite { "  ♥" } else { "" }
                );
                let ratings = first_snapshot(self.repository.get_ratings_by_recipe_id(id)).await?;
                if ratings.is_empty() {
                    println!("No ratings yet");
                }
                for rating in ratings {
                    println!(
                        "{}  {:.1}  {}",
                        rating.created_at.format("%Y-%m-%d %H:%M"),
                        rating.rating,
                        rating.comment
                    );
                }
            }

            Command::Random { count } => {
                let count = count.unwrap_or(self.config.random_count);
                print_recipes(&self.repository.get_random_recipes(count).await?);
            }

            Command::Top { count } => {
                let count = count.unwrap_or(self.config.top_rated_count);
                print_recipes(&first_snapshot(self.repository.get_top_rated_recipes(count)).await?);
            }

            Command::Recent { count } => {
                let count = count.unwrap_or(self.config.recent_count);
                print_recipes(&first_snapshot(self.repository.get_recent_recipes(count)).await?);
            }

            Command::HighRated { min } => {
                print_recipes(&first_snapshot(self.repository.get_high_rated_recipes(min)).await?);
            }

            Command::Categories => {
                let categories = first_snapshot(self.repository.get_all_categories()).await?;
                for category in categories {
                    println!(
                        "{:>3}  {:<12} {:<8} {:>4} recipes",
                        category.sort_order,
                        category.id,
                        category.display_name,
                        category.recipe_count
                    );
                }
            }

            Command::Stats => {
                let total = self.repository.get_total_recipe_count().await?;
                println!("{total} recipes");
                for stat in self.repository.get_category_stats().await? {
                    println!(
                        "  {:<12} {:<8} {:>4} recipes, average rating {:.2}",
                        stat.category_name,
                        display_name(&stat.category_name),
                        stat.recipe_count,
                        stat.average_rating
                    );
                }
            }

            Command::Seasoning => {
                let seasoning = self.repository.get_seasoning_data().await;
                if seasoning.is_empty() {
                    println!("No seasoning data available");
                }
                for recipe in &seasoning {
                    print_seasoning(recipe);
                }
            }

            Command::Image { reference } => match self.repository.catalogue().image_file(&reference) {
                Some(path) => println!("{}", path.display()),
                None => println!("(no image)"),
            },

            Command::Watch {
                target,
                query,
                snapshots,
            } => {
                let live = match target {
                    WatchTarget::All => self.repository.get_all_recipes(),
                    WatchTarget::Favorites => self.repository.get_favorite_recipes(),
                    WatchTarget::Top => self
                        .repository
                        .get_top_rated_recipes(self.config.top_rated_count),
                    WatchTarget::Recent => self
                        .repository
                        .get_recent_recipes(self.config.recent_count),
                    WatchTarget::Search => self.repository.search(&query),
                };
                watch_recipes(live, snapshots).await?;
            }
        }

        Ok(())
    }

    fn print_recipe_detail(
        &self,
        recipe: &Recipe,
        category: Option<&Category>,
        favorite: Option<&Favorite>,
    ) {
        println!("{}", recipe.title);
        match category {
            Some(category) => println!(
                "Category: {} ({}), {}",
                category.display_name, category.id, category.description
            ),
            None => println!(
                "Category: {} ({})",
                recipe.category_display_name(),
                recipe.category
            ),
        }
        println!("Rating: {:.2}", recipe.rating);
        if let Some(favorite) = favorite {
            println!("♥ Favorite since {}", favorite.created_at.format("%Y-%m-%d"));
        }
        if !recipe.description.is_empty() {
            println!("\n{}", recipe.description);
        }

        println!("\nIngredients:");
        for ingredient in &recipe.ingredients {
            println!("  - {ingredient}");
        }

        println!("\nInstructions:");
        for (step, instruction) in recipe.instructions.iter().enumerate() {
            println!("  {}. {}", step + 1, instruction);
        }

        match self.repository.catalogue().image_file(&recipe.image_path) {
            Some(path) => println!("\nImage: {}", path.display()),
            None => println!("\nImage: (none)"),
        }
        if !recipe.source_file.is_empty() {
            println!("Source: {}", recipe.source_file);
        }
    }
}

async fn first_snapshot<T: Send + 'static>(mut query: LiveQuery<T>) -> Result<Vec<T>> {
    query.next().await.unwrap_or_else(|| Ok(Vec::new()))
}

async fn watch_recipes(mut live: LiveQuery<Recipe>, limit: Option<usize>) -> Result<()> {
    let mut seen = 0;
    loop {
        tokio::select! {
            snapshot = live.next() => {
                let Some(snapshot) = snapshot else {
                    break;
                };
                let recipes = snapshot?;
                seen += 1;
                println!("--- snapshot {seen}: {} recipes", recipes.len());
                print_recipes(&recipes);
                if limit.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

pub fn recipe_line(recipe: &Recipe) -> String {
    format!(
        "{:>5}  {}  [{}]  {:.1}{}",
        recipe.id,
        recipe.title,
        recipe.category_display_name(),
        recipe.rating,
        if recipe.is_favorite { "  ♥" } else { "" }
    )
}

fn print_recipes(recipes: &[Recipe]) {
    if recipes.is_empty() {
        println!("No recipes found");
    }
    for recipe in recipes {
        println!("{}", recipe_line(recipe));
    }
}

fn print_section(title: &str, recipes: &[Recipe]) {
    println!("== {title}");
    print_recipes(recipes);
    println!();
}

fn print_seasoning(recipe: &CatalogueRecipe) {
    println!("{}", recipe.title);
    for ingredient in &recipe.ingredients {
        println!("  - {ingredient}");
    }
}
