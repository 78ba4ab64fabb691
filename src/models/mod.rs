// Resources served by the bundled binary.

use serde::{Deserialize, Serialize};

use crate::database::RecordId;
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: bool,
}

impl Resource for Article {
    const NAME: &'static str = "Article";

    fn id(&self) -> Option<RecordId> {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Resource for Author {
    const NAME: &'static str = "Author";

    fn id(&self) -> Option<RecordId> {
        self.id
    }
}
