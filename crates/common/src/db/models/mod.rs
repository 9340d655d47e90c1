//! SeaORM entity models
//!
//! Database entities for MindPub documents and their pages

mod document;
mod page;

pub use document::{
    Entity as DocumentEntity,
    Model as Document,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};

pub use page::{
    Entity as PageEntity,
    Model as Page,
    ActiveModel as PageActiveModel,
    Column as PageColumn,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields of a document row about to be created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub page_count: i32,
    pub cover_path: Option<String>,
    pub source_path: String,
    pub source_format: String,
    pub release_date: Option<String>,
    pub publisher: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub rights: Option<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub uploaded_by: Option<Uuid>,
}

/// A page row about to be upserted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPage {
    pub page_number: i32,
    pub content: String,
    pub chapter_number: Option<i32>,
    pub chapter_title: Option<String>,
}
