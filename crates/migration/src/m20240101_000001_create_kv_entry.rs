//! Create `kv_entry` table.
//!
//! One row per key; `json` holds the serialized JSON value.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(KvEntry::Table)
                    .if_not_exists()
                    .col(string(KvEntry::Id).primary_key())
                    .col(text(KvEntry::Json))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(KvEntry::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum KvEntry { Table, Id, Json }
