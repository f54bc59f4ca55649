use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Browse the bundled recipe catalogue from the command line.
#[derive(Debug, Parser)]
#[command(name = "recipe-shelf", version, about)]
pub struct Cli {
    /// Path to an alternative config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the database file location
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Override the catalogue bundle directory
    #[arg(long, global = true)]
    pub catalogue: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Import the bundled catalogue (no-op if already imported)
    Import,

    /// Delete all recipes, categories, favorites and ratings
    Clear,

    /// Show a home overview: random picks, top rated and recent recipes
    Home,

    /// List recipes, optionally restricted to one category
    List {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show one recipe in full
    Show { id: i64 },

    /// Search titles, ingredients and instructions
    Search { query: String },

    /// Toggle the favorite flag of a recipe
    Favorite { id: i64 },

    /// List favorite recipes, newest first
    Favorites,

    /// Add a rating to a recipe
    Rate {
        id: i64,
        value: f64,
        #[arg(short, long, default_value = "")]
        comment: String,
    },

    /// List the ratings of a recipe
    Ratings { id: i64 },

    /// Pick random recipes
    Random { count: Option<usize> },

    /// Best rated recipes
    Top { count: Option<usize> },

    /// Most recently added recipes
    Recent { count: Option<usize> },

    /// Recipes rated at least `min`
    HighRated { min: f64 },

    /// List categories in display order
    Categories,

    /// Recipe count and average rating per category
    Stats,

    /// Seasoning recipes, read straight from the bundle
    Seasoning,

    /// Resolve an image reference to a file in the bundle
    Image { reference: String },

    /// Print every new snapshot of a live list until interrupted
    Watch {
        #[arg(value_enum)]
        target: WatchTarget,

        /// Search query, used with the `search` target
        #[arg(short, long, default_value = "")]
        query: String,

        /// Stop after this many snapshots
        #[arg(short = 'n', long)]
        snapshots: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchTarget {
    All,
    Favorites,
    Top,
    Recent,
    Search,
}
