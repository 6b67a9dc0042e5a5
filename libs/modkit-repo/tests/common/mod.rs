//! Shared test entity, schemas and storage fixtures
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use modkit_repo::contract::{
    AuditMeta, CreateSchema, FieldDef, FieldKind, FieldValue, MappingError, Patch, ReadSchema,
    Record, Schema, UpdateSchema, ValidationErrors, DELETED_AT_FIELD, ID_FIELD,
};
use modkit_repo::infra::SeaOrmRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Inventory item: audited, soft-deletable, unique name
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub note: Option<String>,
    pub quantity: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

modkit_repo::impl_identity!(Item);
modkit_repo::impl_audit!(Item);
modkit_repo::impl_soft_delete!(Item);

impl Record for Item {
    const NAME: &'static str = "item";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::id(),
            FieldDef::new("name", FieldKind::Text).unique(),
            FieldDef::new("note", FieldKind::Text).nullable(),
            FieldDef::new("quantity", FieldKind::Int),
            FieldDef::created_at(),
            FieldDef::updated_at(),
            FieldDef::deleted_at(),
        ];
        FIELDS
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        match field {
            ID_FIELD => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "note" => Some(self.note.clone().into()),
            "quantity" => Some(self.quantity.into()),
            "created_at" => Some(self.created_at.into()),
            "updated_at" => Some(self.updated_at.into()),
            DELETED_AT_FIELD => Some(self.deleted_at.into()),
            _ => None,
        }
    }

    modkit_repo::record_capabilities!(audit, soft_delete);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCreate {
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub quantity: i64,
}

impl ItemCreate {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            note: None,
            quantity: 0,
        }
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }
}

fn item_properties() -> serde_json::Value {
    json!({
        "name": { "type": "string", "minLength": 1, "maxLength": 64 },
        "note": { "type": ["string", "null"] },
        "quantity": { "type": "integer", "minimum": 0 }
    })
}

fn check_note(note: Option<&str>, errors: &mut ValidationErrors) {
    if note.is_some_and(|n| n.trim().is_empty()) {
        errors.push("note", "must not be blank; use null to clear");
    }
}

impl Schema for ItemCreate {
    fn json_schema() -> Option<serde_json::Value> {
        Some(json!({
            "type": "object",
            "required": ["name"],
            "properties": item_properties()
        }))
    }

    fn check(&self, errors: &mut ValidationErrors) {
        check_note(self.note.as_deref(), errors);
    }
}

impl CreateSchema<Item> for ItemCreate {
    fn to_entity(self) -> Item {
        Item {
            id: Uuid::nil(),
            name: self.name,
            note: self.note,
            quantity: self.quantity,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub note: Patch<Option<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub quantity: Patch<i64>,
}

impl Schema for ItemUpdate {
    fn json_schema() -> Option<serde_json::Value> {
        Some(json!({
            "type": "object",
            "properties": item_properties()
        }))
    }

    fn check(&self, errors: &mut ValidationErrors) {
        if let Some(note) = self.note.as_set() {
            check_note(note.as_deref(), errors);
        }
    }
}

impl UpdateSchema<Item> for ItemUpdate {
    fn apply_update(self, entity: &mut Item) {
        self.name.apply_to(&mut entity.name);
        self.note.apply_to(&mut entity.note);
        self.quantity.apply_to(&mut entity.quantity);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRead {
    #[serde(flatten)]
    pub meta: AuditMeta,
    pub name: String,
    pub note: Option<String>,
    pub quantity: i64,
}

impl ReadSchema<Item> for ItemRead {
    fn from_entity(entity: &Item) -> Result<Self, MappingError> {
        Ok(Self {
            meta: AuditMeta::of(entity)?,
            name: entity.name.clone(),
            note: entity.note.clone(),
            quantity: entity.quantity,
        })
    }
}

/// Label with identity only: no audit fields, no delete marker
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub label: String,
}

modkit_repo::impl_identity!(Tag);

impl Record for Tag {
    const NAME: &'static str = "tag";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[FieldDef::id(), FieldDef::new("label", FieldKind::Text)];
        FIELDS
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        match field {
            ID_FIELD => Some(self.id.into()),
            "label" => Some(self.label.as_str().into()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCreate {
    pub label: String,
}

impl Schema for TagCreate {}

impl CreateSchema<Tag> for TagCreate {
    fn to_entity(self) -> Tag {
        Tag {
            id: Uuid::nil(),
            label: self.label,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub label: Patch<String>,
}

impl Schema for TagUpdate {}

impl UpdateSchema<Tag> for TagUpdate {
    fn apply_update(self, entity: &mut Tag) {
        self.label.apply_to(&mut entity.label);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRead {
    pub id: Uuid,
    pub label: String,
}

impl ReadSchema<Tag> for TagRead {
    fn from_entity(entity: &Tag) -> Result<Self, MappingError> {
        Ok(Self {
            id: entity.id,
            label: entity.label.clone(),
        })
    }
}

// ===== SeaORM binding =====

pub mod item_entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "items")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub name: String,
        pub note: Option<String>,
        pub quantity: i64,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
        pub deleted_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl From<item_entity::Model> for Item {
    fn from(model: item_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            note: model.note,
            quantity: model.quantity,
            created_at: Some(model.created_at),
            updated_at: Some(model.updated_at),
            deleted_at: model.deleted_at,
        }
    }
}

impl From<&Item> for item_entity::ActiveModel {
    fn from(item: &Item) -> Self {
        use sea_orm::ActiveValue::Set;

        let now = Utc::now();
        Self {
            id: Set(item.id),
            name: Set(item.name.clone()),
            note: Set(item.note.clone()),
            quantity: Set(item.quantity),
            created_at: Set(item.created_at.unwrap_or(now)),
            updated_at: Set(item.updated_at.unwrap_or(now)),
            deleted_at: Set(item.deleted_at),
        }
    }
}

impl SeaOrmRecord for Item {
    type Entity = item_entity::Entity;
    type ActiveModel = item_entity::ActiveModel;

    fn to_active_model(&self) -> Self::ActiveModel {
        self.into()
    }

    fn from_model(model: item_entity::Model) -> Self {
        model.into()
    }
}

pub mod migrations {
    use modkit_repo::infra::storage::migrations::{deleted_at_index, record_table, Mixins};
    use sea_orm_migration::prelude::*;

    pub struct Migrator;

    #[async_trait::async_trait]
    impl MigratorTrait for Migrator {
        fn migrations() -> Vec<Box<dyn MigrationTrait>> {
            vec![Box::new(m20250101_000001_create_items::Migration)]
        }
    }

    mod m20250101_000001_create_items {
        use super::*;

        #[derive(DeriveMigrationName)]
        pub struct Migration;

        #[async_trait::async_trait]
        impl MigrationTrait for Migration {
            async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .create_table(
                        record_table(Items::Table, Mixins::ALL)
                            .col(ColumnDef::new(Items::Name).string().not_null().unique_key())
                            .col(ColumnDef::new(Items::Note).string())
                            .col(ColumnDef::new(Items::Quantity).big_integer().not_null())
                            .to_owned(),
                    )
                    .await?;
                manager
                    .create_index(deleted_at_index(Items::Table, "idx_items_deleted_at"))
                    .await
            }

            async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .drop_table(Table::drop().table(Items::Table).to_owned())
                    .await
            }
        }

        #[derive(DeriveIden)]
        enum Items {
            Table,
            Name,
            Note,
            Quantity,
        }
    }
}

/// Fresh in-memory SQLite database with the items table
///
/// A single pooled connection keeps the in-memory database alive; sessions
/// sharing it must run one at a time.
pub async fn sqlite() -> Arc<sea_orm::DatabaseConnection> {
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migrations::Migrator::up(&db, None).await.unwrap();
    Arc::new(db)
}

pub fn print_test_header(test_name: &str, purpose: &str) {
    println!("\n🧪 TEST: {}", test_name);
    println!("📋 PURPOSE: {}", purpose);
}
