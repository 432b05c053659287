use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoPage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl InfoPage {
    pub fn validate(&self) -> Result<(), ErrorKind> {
        if self.title.trim().is_empty() {
            return Err(ErrorKind::Payload(format!("info page {} has no title", self.id)));
        }
        Ok(())
    }
}
