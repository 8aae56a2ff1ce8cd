use super::RegistryError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const BOOKS_FILE: &str = "books.json";
const READING_LIST_FILE: &str = "reading_list.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub year: u32,
    pub rating: f64,
    pub summary: String,
}

/// User reading list plus whatever stats fields live alongside it.
/// Unknown fields are preserved verbatim across rewrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingData {
    pub reading_list: Vec<String>,
    #[serde(flatten)]
    pub stats: Map<String, Value>,
}

/// Flat-file store backing the registry. Every read hits the disk so that
/// out-of-band edits to the JSON files are picked up without a restart.
/// Writes are a plain read-modify-write; concurrent writers are not supported.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn books_path(&self) -> PathBuf {
        self.data_dir.join(BOOKS_FILE)
    }

    fn reading_list_path(&self) -> PathBuf {
        self.data_dir.join(READING_LIST_FILE)
    }

    pub fn load_books(&self) -> Result<Vec<Book>, RegistryError> {
        let path = self.books_path();
        let raw = read_file(&path)?;
        serde_json::from_str(&raw).map_err(|source| RegistryError::Data { path, source })
    }

    pub fn raw_books(&self) -> Result<String, RegistryError> {
        read_file(&self.books_path())
    }

    pub fn load_reading_data(&self) -> Result<ReadingData, RegistryError> {
        let path = self.reading_list_path();
        let raw = read_file(&path)?;
        serde_json::from_str(&raw).map_err(|source| RegistryError::Data { path, source })
    }

    pub fn raw_reading_data(&self) -> Result<String, RegistryError> {
        read_file(&self.reading_list_path())
    }

    pub fn save_reading_data(&self, data: &ReadingData) -> Result<(), RegistryError> {
        let path = self.reading_list_path();
        let raw = serde_json::to_string_pretty(data).map_err(|source| RegistryError::Data {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Persisting reading list");
        fs::write(&path, raw).map_err(|source| RegistryError::Io { path, source })
    }
}

fn read_file(path: &Path) -> Result<String, RegistryError> {
    fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn seed(dir: &Path) -> Store {
        fs::write(
            dir.join(BOOKS_FILE),
            serde_json::to_string_pretty(&serde_json::json!([
                {
                    "id": "dune",
                    "title": "Dune",
                    "author": "Frank Herbert",
                    "genre": "Science Fiction",
                    "year": 1965,
                    "rating": 4.5,
                    "summary": "A young noble navigates politics and prophecy on a desert planet."
                },
                {
                    "id": "1984",
                    "title": "1984",
                    "author": "George Orwell",
                    "genre": "Dystopian",
                    "year": 1949,
                    "rating": 4.6,
                    "summary": "Surveillance state crushes truth and memory."
                },
                {
                    "id": "hobbit",
                    "title": "The Hobbit",
                    "author": "J.R.R. Tolkien",
                    "genre": "Fantasy",
                    "year": 1937,
                    "rating": 4.3,
                    "summary": "A reluctant burglar joins a quest to reclaim a dragon's hoard."
                }
            ]))
            .expect("serialize books"),
        )
        .expect("write books fixture");

        fs::write(
            dir.join(READING_LIST_FILE),
            serde_json::to_string_pretty(&serde_json::json!({
                "reading_list": ["hobbit"],
                "books_read_this_year": 9,
                "yearly_goal": 24,
                "favorite_genres": ["Science Fiction", "Fantasy"]
            }))
            .expect("serialize reading list"),
        )
        .expect("write reading list fixture");

        Store::new(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_preserves_stats_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixtures::seed(dir.path());

        let mut data = store.load_reading_data().expect("load");
        data.reading_list.push("dune".to_string());
        store.save_reading_data(&data).expect("save");

        let reloaded = store.load_reading_data().expect("reload");
        assert_eq!(reloaded.reading_list, vec!["hobbit", "dune"]);
        assert_eq!(
            reloaded.stats.get("yearly_goal").and_then(Value::as_u64),
            Some(24)
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path());
        let error = store.load_books().expect_err("no data seeded");
        assert!(matches!(error, RegistryError::Io { .. }));
    }
}
