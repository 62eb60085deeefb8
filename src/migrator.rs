use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_companies_table::Migration),
            Box::new(m20240101_000002_create_users_table::Migration),
            Box::new(m20240101_000003_create_memberships_table::Migration),
            Box::new(m20240101_000004_create_sales_tables::Migration),
            Box::new(m20240101_000005_create_warranties_table::Migration),
            Box::new(m20240101_000006_create_service_histories_table::Migration),
        ]
    }
}

#[derive(DeriveIden)]
pub(crate) enum Companies {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    Name,
    Phone,
    PasswordHash,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Sales {
    Table,
    Id,
    CompanyId,
    InvoiceNumber,
    CustomerName,
    CustomerDocument,
    Total,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum SaleItems {
    Table,
    Id,
    SaleId,
    CompanyId,
    ProductId,
    ProductName,
    Quantity,
    UnitPrice,
    WarrantyMonths,
    SerialNumbers,
}

#[derive(DeriveIden)]
pub(crate) enum Warranties {
    Table,
    Id,
    CompanyId,
    SaleId,
    SaleItemId,
    ProductId,
    SerialNumber,
    StartDate,
    WarrantyMonths,
    ExpiresAt,
    IsActive,
    InvoiceNumber,
    CreatedAt,
    UpdatedAt,
}

mod m20240101_000001_create_companies_table {
    use super::Companies;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_companies_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Companies::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Companies::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Companies::Name).string().not_null())
                        .col(
                            ColumnDef::new(Companies::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Companies::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000002_create_users_table {
    use super::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_users_table"
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
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().null())
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(ColumnDef::new(Users::PasswordHash).string().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000003_create_memberships_table {
    use super::{Companies, Users};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_memberships_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Memberships::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Memberships::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Memberships::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Memberships::UserId).uuid().not_null())
                        .col(ColumnDef::new(Memberships::Role).string().not_null())
                        .col(
                            ColumnDef::new(Memberships::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_memberships_company")
                                .from(Memberships::Table, Memberships::CompanyId)
                                .to(Companies::Table, Companies::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_memberships_user")
                                .from(Memberships::Table, Memberships::UserId)
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
                        .name("uq_memberships_company_user")
                        .table(Memberships::Table)
                        .col(Memberships::CompanyId)
                        .col(Memberships::UserId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Memberships::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Memberships {
        Table,
        Id,
        CompanyId,
        UserId,
        Role,
        CreatedAt,
    }
}

mod m20240101_000004_create_sales_tables {
    use super::{Companies, SaleItems, Sales};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Sales::InvoiceNumber).string().null())
                        .col(ColumnDef::new(Sales::CustomerName).string().not_null())
                        .col(ColumnDef::new(Sales::CustomerDocument).string().null())
                        .col(
                            ColumnDef::new(Sales::Total)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_company")
                                .from(Sales::Table, Sales::CompanyId)
                                .to(Companies::Table, Companies::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sales_company_id")
                        .table(Sales::Table)
                        .col(Sales::CompanyId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleItems::SaleId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::ProductName).string().not_null())
                        .col(ColumnDef::new(SaleItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(SaleItems::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SaleItems::WarrantyMonths)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SaleItems::SerialNumbers).json().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_sale")
                                .from(SaleItems::Table, SaleItems::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_items_sale_id")
                        .table(SaleItems::Table)
                        .col(SaleItems::SaleId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000005_create_warranties_table {
    use super::{SaleItems, Sales, Warranties};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_warranties_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warranties::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warranties::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warranties::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Warranties::SaleId).uuid().not_null())
                        .col(ColumnDef::new(Warranties::SaleItemId).uuid().not_null())
                        .col(ColumnDef::new(Warranties::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(Warranties::SerialNumber)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Warranties::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warranties::WarrantyMonths)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warranties::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warranties::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Warranties::InvoiceNumber).string().null())
                        .col(
                            ColumnDef::new(Warranties::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warranties::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warranties_sale")
                                .from(Warranties::Table, Warranties::SaleId)
                                .to(Sales::Table, Sales::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warranties_sale_item")
                                .from(Warranties::Table, Warranties::SaleItemId)
                                .to(SaleItems::Table, SaleItems::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_warranties_sale_item_serial")
                        .table(Warranties::Table)
                        .col(Warranties::SaleItemId)
                        .col(Warranties::SerialNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warranties_company_created")
                        .table(Warranties::Table)
                        .col(Warranties::CompanyId)
                        .col(Warranties::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warranties_company_expires")
                        .table(Warranties::Table)
                        .col(Warranties::CompanyId)
                        .col(Warranties::ExpiresAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warranties::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000006_create_service_histories_table {
    use super::Warranties;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_service_histories_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ServiceHistories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceHistories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceHistories::WarrantyId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceHistories::CompanyId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceHistories::SerialNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceHistories::Status).string().not_null())
                        .col(ColumnDef::new(ServiceHistories::Reason).string().not_null())
                        .col(
                            ColumnDef::new(ServiceHistories::Observations)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(ServiceHistories::Photos).json().not_null())
                        .col(
                            ColumnDef::new(ServiceHistories::EntryDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceHistories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_service_histories_warranty")
                                .from(ServiceHistories::Table, ServiceHistories::WarrantyId)
                                .to(Warranties::Table, Warranties::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_service_histories_warranty")
                        .table(ServiceHistories::Table)
                        .col(ServiceHistories::WarrantyId)
                        .col(ServiceHistories::EntryDate)
                        .to_owned(),
                )
                .await?;

            // At most one open repair per warranty. Both Postgres and SQLite
            // accept partial indexes; the query builder has no syntax for them.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_service_histories_open_per_warranty \
                     ON service_histories (warranty_id) WHERE status <> 'delivered'",
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ServiceHistories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ServiceHistories {
        Table,
        Id,
        WarrantyId,
        CompanyId,
        SerialNumber,
        Status,
        Reason,
        Observations,
        Photos,
        EntryDate,
        UpdatedAt,
    }
}
