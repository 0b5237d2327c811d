use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "search_notes";
pub const DESCRIPTION: &str = "Search notes by keyword, newest first. Matches title and content \
     case-insensitively, and the note whose ID is exactly the keyword.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchNotesParams {
    #[schemars(description = "Search keyword (case-insensitive; a keyword like \"42\" also matches note 42)")]
    pub keyword: String,

    #[schemars(
        description = "Maximum number of notes to return (default: 10, max: 100)",
        range(min = 1, max = 100)
    )]
    pub limit: Option<i64>,
}
