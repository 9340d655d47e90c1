//! Document entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub author: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub category: Option<String>,

    pub page_count: i32,

    /// Path of the saved cover image, if one was extracted
    #[sea_orm(column_type = "Text", nullable)]
    pub cover_path: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub source_path: String,

    /// `epub` or `pdf`
    #[sea_orm(column_type = "Text")]
    pub source_format: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub release_date: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub publisher: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub subject: Option<String>,

    /// Subject tags as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub rights: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub language: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub identifier: Option<String>,

    pub uploaded_by: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::page::Entity", on_delete = "Cascade")]
    Pages,
}

impl Related<super::page::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
