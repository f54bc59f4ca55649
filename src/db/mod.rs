mod live;
mod repository;
mod schema;

pub use live::LiveQuery;
pub use repository::Repository;
