//! Document entity

use crate::document::{Document, ExtractionMethod, ProcessingStatus};
use crate::errors::AppError;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub filename: String,

    #[sea_orm(column_type = "Text")]
    pub filepath: String,

    pub upload_time: DateTimeWithTimeZone,

    pub file_size: Option<i64>,

    pub page_count: Option<i32>,

    /// pending, processing, completed, failed
    #[sea_orm(column_type = "Text")]
    pub processing_status: String,

    /// text, ocr, mixed, error
    #[sea_orm(column_type = "Text", nullable)]
    pub extraction_method: Option<String>,

    pub processing_start_time: Option<DateTimeWithTimeZone>,

    pub processing_end_time: Option<DateTimeWithTimeZone>,

    /// Seconds
    pub processing_duration: Option<f64>,

    pub text_length: Option<i64>,

    pub chunk_count: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub processing_error: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content_preview: Option<String>,

    /// JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub key_topics: serde_json::Value,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Document {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let processing_status: ProcessingStatus = model.processing_status.parse()?;
        let extraction_method = model
            .extraction_method
            .as_deref()
            .map(str::parse::<ExtractionMethod>)
            .transpose()?;
        let key_topics: Vec<String> = serde_json::from_value(model.key_topics)?;

        Ok(Document {
            id: model.id,
            filename: model.filename,
            filepath: model.filepath,
            upload_time: model.upload_time.with_timezone(&Utc),
            file_size: model.file_size.map(|v| v.max(0) as u64),
            page_count: model.page_count.map(|v| v.max(0) as u32),
            processing_status,
            extraction_method,
            processing_start_time: model.processing_start_time.map(|t| t.with_timezone(&Utc)),
            processing_end_time: model.processing_end_time.map(|t| t.with_timezone(&Utc)),
            processing_duration: model.processing_duration,
            text_length: model.text_length.map(|v| v.max(0) as usize),
            chunk_count: model.chunk_count.max(0) as usize,
            processing_error: model.processing_error,
            content_preview: model.content_preview,
            key_topics,
        })
    }
}

impl From<&Document> for ActiveModel {
    fn from(doc: &Document) -> Self {
        ActiveModel {
            id: Set(doc.id),
            filename: Set(doc.filename.clone()),
            filepath: Set(doc.filepath.clone()),
            upload_time: Set(doc.upload_time.into()),
            file_size: Set(doc.file_size.map(|v| v as i64)),
            page_count: Set(doc.page_count.map(|v| v as i32)),
            processing_status: Set(doc.processing_status.as_str().to_string()),
            extraction_method: Set(doc.extraction_method.map(|m| m.as_str().to_string())),
            processing_start_time: Set(doc.processing_start_time.map(Into::into)),
            processing_end_time: Set(doc.processing_end_time.map(Into::into)),
            processing_duration: Set(doc.processing_duration),
            text_length: Set(doc.text_length.map(|v| v as i64)),
            chunk_count: Set(doc.chunk_count as i32),
            processing_error: Set(doc.processing_error.clone()),
            content_preview: Set(doc.content_preview.clone()),
            key_topics: Set(serde_json::Value::from(doc.key_topics.clone())),
        }
    }
}
