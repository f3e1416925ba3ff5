use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_counterparties_table::Migration),
            Box::new(m20240301_000002_create_assets_table::Migration),
            Box::new(m20240301_000003_create_documents_tables::Migration),
            Box::new(m20240301_000004_create_attachments_table::Migration),
            Box::new(m20240301_000005_create_auth_tables::Migration),
            Box::new(m20240301_000006_seed_role_permissions::Migration),
        ]
    }
}

mod m20240301_000001_create_counterparties_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_counterparties_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Counterparties::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Counterparties::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Counterparties::Code)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Counterparties::Name).string().not_null())
                        .col(
                            ColumnDef::new(Counterparties::Kind)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Counterparties::TaxId).string().null())
                        .col(ColumnDef::new(Counterparties::Email).string().null())
                        .col(ColumnDef::new(Counterparties::Phone).string().null())
                        .col(ColumnDef::new(Counterparties::Address).text().null())
                        .col(
                            ColumnDef::new(Counterparties::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Counterparties::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_counterparties_name")
                        .table(Counterparties::Table)
                        .col(Counterparties::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Counterparties::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Counterparties {
        Table,
        Id,
        Code,
        Name,
        Kind,
        TaxId,
        Email,
        Phone,
        Address,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_assets_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_assets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Assets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Assets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Assets::AssetTag).string_len(32).not_null())
                        .col(ColumnDef::new(Assets::Name).string().not_null())
                        .col(ColumnDef::new(Assets::Category).string().null())
                        .col(ColumnDef::new(Assets::SerialNumber).string().null())
                        .col(ColumnDef::new(Assets::Location).string().null())
                        .col(ColumnDef::new(Assets::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Assets::PurchaseDate).date().null())
                        .col(ColumnDef::new(Assets::PurchaseCost).decimal_len(16, 2).null())
                        .col(ColumnDef::new(Assets::Notes).text().null())
                        .col(
                            ColumnDef::new(Assets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Assets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assets_asset_tag")
                        .table(Assets::Table)
                        .col(Assets::AssetTag)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Assets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Assets {
        Table,
        Id,
        AssetTag,
        Name,
        Category,
        SerialNumber,
        Location,
        Status,
        PurchaseDate,
        PurchaseCost,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_documents_tables {
    use super::m20240301_000001_create_counterparties_table::Counterparties;
    use super::m20240301_000002_create_assets_table::Assets;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_documents_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Documents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Documents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Documents::Kind).string_len(32).not_null())
                        .col(ColumnDef::new(Documents::Number).string_len(32).not_null())
                        .col(ColumnDef::new(Documents::DocumentDate).date().not_null())
                        .col(ColumnDef::new(Documents::DueDate).date().null())
                        .col(ColumnDef::new(Documents::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Documents::CounterpartyId).uuid().not_null())
                        .col(ColumnDef::new(Documents::AssetId).uuid().null())
                        .col(ColumnDef::new(Documents::Reference).string().null())
                        .col(ColumnDef::new(Documents::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Documents::Notes).text().null())
                        .col(
                            ColumnDef::new(Documents::TotalAmount)
                                .decimal_len(16, 6)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Documents::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Documents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Documents::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_documents_counterparty")
                                .from(Documents::Table, Documents::CounterpartyId)
                                .to(Counterparties::Table, Counterparties::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_documents_asset")
                                .from(Documents::Table, Documents::AssetId)
                                .to(Assets::Table, Assets::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // Numbers are looked up by prefix; uniqueness is not enforced here.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_documents_number")
                        .table(Documents::Table)
                        .col(Documents::Number)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_documents_kind_date")
                        .table(Documents::Table)
                        .col(Documents::Kind)
                        .col(Documents::DocumentDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_documents_counterparty_id")
                        .table(Documents::Table)
                        .col(Documents::CounterpartyId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_documents_asset_id")
                        .table(Documents::Table)
                        .col(Documents::AssetId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DocumentItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DocumentItems::DocumentId).uuid().not_null())
                        .col(ColumnDef::new(DocumentItems::LineNo).integer().not_null())
                        .col(ColumnDef::new(DocumentItems::Description).string().not_null())
                        .col(
                            ColumnDef::new(DocumentItems::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .check(Expr::col(DocumentItems::Quantity).gt(0)),
                        )
                        .col(
                            ColumnDef::new(DocumentItems::UnitPrice)
                                .decimal_len(16, 2)
                                .not_null()
                                .check(Expr::col(DocumentItems::UnitPrice).gte(0)),
                        )
                        .col(
                            ColumnDef::new(DocumentItems::LineTotal)
                                .decimal_len(16, 6)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_document_items_document")
                                .from(DocumentItems::Table, DocumentItems::DocumentId)
                                .to(Documents::Table, Documents::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_document_items_document_id")
                        .table(DocumentItems::Table)
                        .col(DocumentItems::DocumentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Documents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Documents {
        Table,
        Id,
        Kind,
        Number,
        DocumentDate,
        DueDate,
        Status,
        CounterpartyId,
        AssetId,
        Reference,
        Currency,
        Notes,
        TotalAmount,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DocumentItems {
        Table,
        Id,
        DocumentId,
        LineNo,
        Description,
        Quantity,
        UnitPrice,
        LineTotal,
        CreatedAt,
    }
}

mod m20240301_000004_create_attachments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_attachments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Attachments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Attachments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Attachments::Area).string_len(32).not_null())
                        .col(ColumnDef::new(Attachments::OwnerId).uuid().null())
                        .col(ColumnDef::new(Attachments::OriginalName).string().not_null())
                        .col(
                            ColumnDef::new(Attachments::StoredName)
                                .string_len(128)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Attachments::ContentType).string().not_null())
                        .col(ColumnDef::new(Attachments::SizeBytes).big_integer().not_null())
                        .col(ColumnDef::new(Attachments::UploadedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Attachments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_attachments_area_stored_name")
                        .table(Attachments::Table)
                        .col(Attachments::Area)
                        .col(Attachments::StoredName)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Attachments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Attachments {
        Table,
        Id,
        Area,
        OwnerId,
        OriginalName,
        StoredName,
        ContentType,
        SizeBytes,
        UploadedBy,
        CreatedAt,
    }
}

mod m20240301_000005_create_auth_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_auth_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserRoles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserRoles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(UserRoles::UserId).uuid().not_null())
                        .col(ColumnDef::new(UserRoles::RoleName).string_len(64).not_null())
                        .col(
                            ColumnDef::new(UserRoles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_roles_user")
                                .from(UserRoles::Table, UserRoles::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_user_roles_user_role")
                        .table(UserRoles::Table)
                        .col(UserRoles::UserId)
                        .col(UserRoles::RoleName)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RolePermissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RolePermissions::RoleName)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RolePermissions::Permission)
                                .string_len(64)
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(RolePermissions::RoleName)
                                .col(RolePermissions::Permission),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Sessions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sessions::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sessions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Sessions::TokenHash)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Sessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sessions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sessions_user")
                                .from(Sessions::Table, Sessions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sessions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RolePermissions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserRoles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum UserRoles {
        Table,
        Id,
        UserId,
        RoleName,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum RolePermissions {
        Table,
        RoleName,
        Permission,
    }

    #[derive(DeriveIden)]
    enum Sessions {
        Table,
        Id,
        UserId,
        TokenHash,
        CreatedAt,
        ExpiresAt,
    }
}

mod m20240301_000006_seed_role_permissions {
    use super::m20240301_000005_create_auth_tables::RolePermissions;
    use crate::auth::SEEDED_ROLES;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_seed_role_permissions"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut insert = Query::insert();
            insert
                .into_table(RolePermissions::Table)
                .columns([RolePermissions::RoleName, RolePermissions::Permission]);
            for (role, permissions) in SEEDED_ROLES {
                for permission in permissions.iter() {
                    insert
                        .values([(*role).into(), (*permission).into()])
                        .map_err(|e| DbErr::Custom(e.to_string()))?;
                }
            }
            manager.exec_stmt(insert).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let roles: Vec<&str> = SEEDED_ROLES.iter().map(|(role, _)| *role).collect();
            manager
                .exec_stmt(
                    Query::delete()
                        .from_table(RolePermissions::Table)
                        .and_where(Expr::col(RolePermissions::RoleName).is_in(roles))
                        .to_owned(),
                )
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, Statement};

    #[tokio::test]
    async fn migrations_apply_and_seed_roles() {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        let db = Database::connect(opt).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let row = db
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM role_permissions WHERE role_name = 'viewer'".to_owned(),
            ))
            .await
            .unwrap()
            .unwrap();
        let n: i64 = row.try_get("", "n").unwrap();
        assert_eq!(n, 5);
    }
}
