use serde::{Deserialize, Serialize};

/// `count` as clients send it: normally a decimal string, a bare number is
/// tolerated. Validation happens in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountField {
    Text(String),
    Number(serde_json::Number),
}

impl CountField {
    pub fn into_string(self) -> String {
        match self {
            CountField::Text(s) => s,
            CountField::Number(n) => n.to_string(),
        }
    }
}
