use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Row of the external vehicle registry. Read only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub vin: String,
    pub make: String,
    #[sea_orm(column_name = "model")]
    pub model_name: String,
    pub model_year: Option<i32>,
    pub color: Option<String>,
    pub registration_no: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
