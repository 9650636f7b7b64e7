//! SeaORM entity models
//!
//! Database entities for Ragnarok document records

mod document;

pub use document::{
    Entity as DocumentEntity,
    Model as DocumentModel,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};
