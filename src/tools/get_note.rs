use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "get_note";
pub const DESCRIPTION: &str = "Retrieve a note by its ID.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetNoteParams {
    #[schemars(description = "Note ID", range(min = 1))]
    pub id: i64,
}
