use sea_orm::{entity::prelude::*, sea_query::OnConflict, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};

use crate::errors;

/// One stored key. `json` is the value serialized as JSON text.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kv_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub json: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef { panic!("no relations defined here") }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the stored JSON text.
    pub fn value(&self) -> Result<serde_json::Value, errors::ModelError> {
        Ok(serde_json::from_str(&self.json)?)
    }
}

fn validate_key(key: &str) -> Result<(), errors::ModelError> {
    if key.is_empty() {
        return Err(errors::ModelError::Validation("key required".into()));
    }
    Ok(())
}

/// Insert or overwrite `key` in a single statement.
pub async fn upsert(db: &DatabaseConnection, key: &str, value: &serde_json::Value) -> Result<(), errors::ModelError> {
    validate_key(key)?;
    let am = ActiveModel {
        id: Set(key.to_string()),
        json: Set(serde_json::to_string(value)?),
    };
    Entity::insert(am)
        .on_conflict(OnConflict::column(Column::Id).update_column(Column::Json).to_owned())
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn find(db: &DatabaseConnection, key: &str) -> Result<Option<Model>, errors::ModelError> {
    Ok(Entity::find_by_id(key.to_string()).one(db).await?)
}

/// Delete `key`; returns whether a row existed.
pub async fn remove(db: &DatabaseConnection, key: &str) -> Result<bool, errors::ModelError> {
    let res = Entity::delete_by_id(key.to_string()).exec(db).await?;
    Ok(res.rows_affected > 0)
}

/// Delete every row; returns the number removed.
pub async fn remove_all(db: &DatabaseConnection) -> Result<u64, errors::ModelError> {
    let res = Entity::delete_many().exec(db).await?;
    Ok(res.rows_affected)
}

/// Full table scan.
pub async fn all(db: &DatabaseConnection) -> Result<Vec<Model>, errors::ModelError> {
    Ok(Entity::find().all(db).await?)
}
