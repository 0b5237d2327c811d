use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::notes::types::NoteUpdate;

pub const NAME: &str = "update_note";
pub const DESCRIPTION: &str = "Update an existing note's title and/or content. \
     Requires the note's ID; fields that are omitted keep their current value.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateNoteParams {
    #[schemars(description = "Note ID", range(min = 1))]
    pub id: i64,

    #[schemars(description = "New note title (optional)")]
    pub title: Option<String>,

    #[schemars(description = "New note content (optional)")]
    pub content: Option<String>,
}

impl UpdateNoteParams {
    pub fn to_update(&self) -> NoteUpdate {
        NoteUpdate {
            title: self.title.clone(),
            content: self.content.clone(),
            favorite: None,
        }
    }
}
