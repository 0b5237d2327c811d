use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "append_note";
pub const DESCRIPTION: &str = "Append text to the end of an existing note without rewriting it. \
     The new text is separated from existing content by a blank line.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AppendNoteParams {
    #[schemars(description = "Note ID", range(min = 1))]
    pub id: i64,

    #[schemars(description = "Text to append")]
    pub content: String,
}
