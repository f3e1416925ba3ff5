use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Grants a permission to every holder of a role
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role_permissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub role_name: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub permission: String,
}

/// Joined on role name; there is no roles table.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::auth::user_role::Entity",
        from = "Column::RoleName",
        to = "crate::auth::user_role::Column::RoleName"
    )]
    UserRole,
}

impl ActiveModelBehavior for ActiveModel {}
