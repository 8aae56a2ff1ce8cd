use super::store::Store;
use super::{Arguments, PromptHandler, RegistryError};
use crate::types::{PromptArgument, PromptDescriptor, RenderedPrompt};
use serde_json::Value;

pub(super) fn handlers() -> Vec<PromptHandler> {
    vec![
        PromptHandler {
            descriptor: PromptDescriptor {
                name: "recommend_books".to_string(),
                description: "Generate personalized book recommendations based on user preferences"
                    .to_string(),
                arguments: vec![
                    PromptArgument {
                        name: "genre".to_string(),
                        description: "Preferred genre".to_string(),
                        required: false,
                    },
                    PromptArgument {
                        name: "mood".to_string(),
                        description: "Current mood or reading preference".to_string(),
                        required: false,
                    },
                ],
            },
            render: recommend_books,
        },
        PromptHandler {
            descriptor: PromptDescriptor {
                name: "reading_progress_report".to_string(),
                description: "Generate a summary of reading progress toward yearly goals"
                    .to_string(),
                arguments: Vec::new(),
            },
            render: reading_progress_report,
        },
        PromptHandler {
            descriptor: PromptDescriptor {
                name: "create_book_review".to_string(),
                description: "Template for writing a structured book review for a specific book"
                    .to_string(),
                arguments: vec![PromptArgument {
                    name: "book_id".to_string(),
                    description: "ID of the book to review".to_string(),
                    required: true,
                }],
            },
            render: create_book_review,
        },
    ]
}

/// Recommendation template with live reading stats and the full catalog
/// injected, so the model works from real data rather than memory.
fn recommend_books(store: &Store, arguments: &Arguments) -> Result<RenderedPrompt, RegistryError> {
    let genre = optional_str(arguments, "genre").unwrap_or("any");
    let mood = optional_str(arguments, "mood").unwrap_or("any");
    let stats = pretty(&store.raw_reading_data()?);
    let catalog = pretty(&store.raw_books()?);

    let prompt_text = format!(
        "You are a knowledgeable librarian. Based on the user's reading history and preferences, \
         recommend 3 books from the catalog.\n\n\
         Reading Stats: {stats}\n\n\
         Book Catalog: {catalog}\n\n\
         User preferences:\n\
         Genre: {genre}\n\
         Mood: {mood}\n\n\
         Provide:\n\
         1. Three specific book recommendations\n\
         2. Brief explanation why each book fits\n\
         3. Note any books they've already read"
    );

    Ok(RenderedPrompt {
        name: "recommend_books".to_string(),
        description: "Generate personalized book recommendations".to_string(),
        prompt_text,
    })
}

fn reading_progress_report(
    store: &Store,
    _arguments: &Arguments,
) -> Result<RenderedPrompt, RegistryError> {
    let stats = pretty(&store.raw_reading_data()?);

    let prompt_text = format!(
        "Generate a comprehensive reading progress report for the user.\n\n\
         Reading Stats: {stats}\n\n\
         Include:\n\
         - Total books read this year vs goal\n\
         - Goal percentage and remaining books needed\n\
         - Favorite genres analysis\n\
         - A personalized motivational message\n\
         - Suggestions to reach their yearly goal"
    );

    Ok(RenderedPrompt {
        name: "reading_progress_report".to_string(),
        description: "Generate a summary of reading progress toward goals".to_string(),
        prompt_text,
    })
}

fn create_book_review(
    store: &Store,
    arguments: &Arguments,
) -> Result<RenderedPrompt, RegistryError> {
    // Required-argument presence is enforced by the registry before dispatch;
    // this re-check guards against a non-string value.
    let book_id = optional_str(arguments, "book_id").ok_or_else(|| {
        RegistryError::InvalidArgument(
            "prompt 'create_book_review' requires a string argument 'book_id'".to_string(),
        )
    })?;

    let books = store.load_books()?;
    let book = books
        .iter()
        .find(|book| book.id == book_id)
        .ok_or_else(|| RegistryError::NotFound(format!("Book with id '{book_id}' not found")))?;

    let details =
        serde_json::to_string_pretty(book).unwrap_or_else(|_| format!("{} (id: {book_id})", book.title));

    let prompt_text = format!(
        "Help the user write a structured review for: {title} by {author}\n\n\
         Book Details: {details}\n\n\
         Guide them through writing a review with these sections:\n\n\
         1. Overall Impression (1-5 stars and one sentence summary)\n\
         2. Plot Summary (2-3 sentences, NO SPOILERS)\n\
         3. What Worked (themes, characters, writing style)\n\
         4. What Didn't Work (constructive criticism)\n\
         5. Recommendation (who would enjoy this book?)\n\n\
         Keep the tone thoughtful and balanced.",
        title = book.title,
        author = book.author,
    );

    Ok(RenderedPrompt {
        name: "create_book_review".to_string(),
        description: "Template for writing a structured book review".to_string(),
        prompt_text,
    })
}

fn optional_str<'a>(arguments: &'a Arguments, field: &str) -> Option<&'a str> {
    arguments.get(field).and_then(Value::as_str)
}

// Re-serializes raw JSON with stable two-space indentation for injection
// into prompt text; malformed input is injected verbatim.
fn pretty(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| raw.to_string())
}
