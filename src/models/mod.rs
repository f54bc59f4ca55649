mod category;
mod feedback;
mod recipe;

pub use category::{display_name, Category, SEASONING_CATEGORY};
pub use feedback::{Favorite, Rating};
pub use recipe::{CatalogueRecipe, CategoryStat, Recipe};
