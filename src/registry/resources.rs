use super::RegistryError;
use super::store::Store;
use crate::types::{ResourceContents, ResourceDescriptor};

pub const CATALOG_URI: &str = "library://books/catalog";
pub const READING_STATS_URI: &str = "library://user/reading-stats";

pub(super) fn descriptors() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            uri: CATALOG_URI.to_string(),
            name: "Book Catalog".to_string(),
            description: "Complete catalog of available books with metadata including title, \
                          author, genre, and ratings"
                .to_string(),
            mime_type: "application/json".to_string(),
        },
        ResourceDescriptor {
            uri: READING_STATS_URI.to_string(),
            name: "Reading Statistics".to_string(),
            description: "User's reading history, progress, and statistics including goals and \
                          favorite genres"
                .to_string(),
            mime_type: "application/json".to_string(),
        },
    ]
}

pub(super) fn read(store: &Store, uri: &str) -> Result<ResourceContents, RegistryError> {
    let text = match uri {
        CATALOG_URI => store.raw_books()?,
        READING_STATS_URI => store.raw_reading_data()?,
        other => {
            return Err(RegistryError::NotFound(format!(
                "Unknown resource URI: {other}"
            )));
        }
    };
    Ok(ResourceContents {
        uri: uri.to_string(),
        mime_type: "application/json".to_string(),
        text,
    })
}
