use serde::{Deserialize, Serialize};

use crate::routes::count_field::CountField;

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchTextRequest {
    pub query: String,
    pub count: CountField,
}
