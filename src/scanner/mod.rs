pub mod discovery;
pub mod indexer;
pub mod metadata;

pub use discovery::{collect_files, discover_images, has_image_extension, resolve_images};
pub use indexer::{index_collection, IndexOptions, IndexProgress, IndexReport, Indexer};
pub use metadata::{detect_format, read_dimensions};
