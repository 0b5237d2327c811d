use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "list_recent_notes";
pub const DESCRIPTION: &str = "List recent notes, newest first. Use this to read or review \
     what has been documented recently.";

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListRecentNotesParams {
    #[schemars(
        description = "Maximum number of notes to return (default: 10, max: 100)",
        range(min = 1, max = 100)
    )]
    pub limit: Option<i64>,
}
