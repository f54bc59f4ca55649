mod bundle;
mod image;
mod importer;

pub use bundle::Catalogue;
pub use importer::{DataImporter, ImportResult};
