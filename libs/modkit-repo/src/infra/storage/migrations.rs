//! Migration helpers for record tables
//!
//! Every record table carries a UUID primary key; audited tables add
//! `created_at`/`updated_at`, soft-deletable ones a nullable `deleted_at`.

use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub enum RecordColumn {
    Id,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

/// Optional column groups of a record table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mixins {
    pub audit: bool,
    pub soft_delete: bool,
}

impl Mixins {
    pub const ALL: Self = Self {
        audit: true,
        soft_delete: true,
    };
}

/// `CREATE TABLE IF NOT EXISTS` with the record columns; add entity columns with `.col(..)`
pub fn record_table<T: IntoIden + 'static>(table: T, mixins: Mixins) -> TableCreateStatement {
    let mut stmt = Table::create();
    stmt.table(table)
        .if_not_exists()
        .col(ColumnDef::new(RecordColumn::Id).uuid().not_null().primary_key());
    if mixins.audit {
        stmt.col(
            ColumnDef::new(RecordColumn::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(RecordColumn::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        );
    }
    if mixins.soft_delete {
        stmt.col(ColumnDef::new(RecordColumn::DeletedAt).timestamp_with_time_zone());
    }
    stmt
}

/// Index serving the `deleted_at IS NULL` filter of active reads
pub fn deleted_at_index<T: IntoIden + 'static>(table: T, name: &str) -> IndexCreateStatement {
    Index::create()
        .name(name)
        .table(table)
        .col(RecordColumn::DeletedAt)
        .if_not_exists()
        .to_owned()
}
