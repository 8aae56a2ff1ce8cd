use super::store::Store;
use super::{Arguments, RegistryError, ToolHandler};
use crate::types::ToolDescriptor;
use serde_json::{Value, json};
use tracing::debug;

const SEARCH_RESULT_CAP: usize = 10;

pub(super) fn handlers() -> Vec<ToolHandler> {
    vec![
        ToolHandler {
            descriptor: ToolDescriptor {
                name: "search_books".to_string(),
                description: "Search for books in the catalog by title, author, or content. \
                              Supports filtering by genre and minimum rating."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search term to match in title, author, or summary"
                        },
                        "genre": {
                            "type": "string",
                            "description": "Optional genre filter (e.g., 'Science Fiction', 'Fantasy')"
                        },
                        "min_rating": {
                            "type": "number",
                            "description": "Optional minimum rating filter (0-5)"
                        }
                    },
                    "required": ["query"]
                }),
            },
            run: search_books,
        },
        ToolHandler {
            descriptor: ToolDescriptor {
                name: "add_to_reading_list".to_string(),
                description: "Add a book to your reading list by its ID. The book must exist in \
                              the catalog."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "book_id": {
                            "type": "string",
                            "description": "ID of the book to add (e.g., 'dune', '1984')"
                        }
                    },
                    "required": ["book_id"]
                }),
            },
            run: add_to_reading_list,
        },
    ]
}

fn search_books(store: &Store, arguments: &Arguments) -> Result<Value, RegistryError> {
    let query = require_str(arguments, "query", "search_books")?;
    let genre = arguments.get("genre").and_then(Value::as_str);
    let min_rating = arguments.get("min_rating").and_then(Value::as_f64);

    let books = store.load_books()?;
    let needle = query.to_lowercase();

    let mut results: Vec<_> = books
        .into_iter()
        .filter(|book| {
            book.title.to_lowercase().contains(&needle)
                || book.author.to_lowercase().contains(&needle)
                || book.summary.to_lowercase().contains(&needle)
        })
        .filter(|book| {
            genre
                .map(|wanted| book.genre.eq_ignore_ascii_case(wanted))
                .unwrap_or(true)
        })
        .filter(|book| min_rating.map(|min| book.rating >= min).unwrap_or(true))
        .collect();
    results.truncate(SEARCH_RESULT_CAP);

    debug!(query, hits = results.len(), "Catalog search completed");
    Ok(json!({
        "success": true,
        "count": results.len(),
        "results": results,
        "query": query,
        "filters": {
            "genre": genre,
            "min_rating": min_rating,
        }
    }))
}

fn add_to_reading_list(store: &Store, arguments: &Arguments) -> Result<Value, RegistryError> {
    let book_id = require_str(arguments, "book_id", "add_to_reading_list")?;

    let books = store.load_books()?;
    if !books.iter().any(|book| book.id == book_id) {
        return Ok(json!({
            "success": false,
            "error": format!("Book with id '{book_id}' not found in catalog"),
            "book_id": book_id,
        }));
    }

    let mut data = store.load_reading_data()?;
    if data.reading_list.iter().any(|id| id == book_id) {
        return Ok(json!({
            "success": false,
            "error": format!("Book '{book_id}' is already in your reading list"),
            "book_id": book_id,
            "reading_list": data.reading_list,
        }));
    }

    data.reading_list.push(book_id.to_string());
    store.save_reading_data(&data)?;

    Ok(json!({
        "success": true,
        "message": format!("Book '{book_id}' added to reading list"),
        "book_id": book_id,
        "reading_list": data.reading_list,
    }))
}

fn require_str<'a>(
    arguments: &'a Arguments,
    field: &str,
    tool: &str,
) -> Result<&'a str, RegistryError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            RegistryError::InvalidArgument(format!(
                "tool '{tool}' requires a string field '{field}'"
            ))
        })
}
