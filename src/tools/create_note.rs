use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "create_note";
pub const DESCRIPTION: &str = "Create a new note. Use this when asked to write a note, take a note, \
     or save information for later.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateNoteParams {
    #[schemars(description = "Note title")]
    pub title: String,

    #[schemars(description = "Note content (markdown allowed)")]
    pub content: String,
}
