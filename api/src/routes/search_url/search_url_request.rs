use serde::{Deserialize, Serialize};

use crate::routes::count_field::CountField;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchUrlRequest {
    pub image_url: String,
    pub count: CountField,
}
