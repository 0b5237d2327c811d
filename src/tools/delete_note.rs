use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "delete_note";
pub const DESCRIPTION: &str = "Delete a note by its ID. Returns the deleted note.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteNoteParams {
    #[schemars(description = "Note ID", range(min = 1))]
    pub id: i64,
}
