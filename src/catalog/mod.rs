mod chapters;
mod model;
mod write;

pub use chapters::assign_end_times;
pub use model::{CatalogItem, Chapter, ContentType};
pub use write::{read_catalog, write_catalog};
