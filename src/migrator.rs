use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_user_tables::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_inventory_tables::Migration),
            Box::new(m20240101_000004_create_order_tables::Migration),
            Box::new(m20240101_000005_create_delivery_tables::Migration),
            Box::new(m20240101_000006_create_dashboard_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_user_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_user_tables"
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
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Email).string().not_null())
                        .col(ColumnDef::new(Users::FirstName).string_len(150).not_null())
                        .col(ColumnDef::new(Users::LastName).string_len(150).not_null())
                        .col(ColumnDef::new(Users::PhoneNumber).string_len(32).null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(ColumnDef::new(Users::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::DateJoined)
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
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserProfiles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::UserId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(UserProfiles::Avatar).string().null())
                        .col(ColumnDef::new(UserProfiles::Bio).text().null())
                        .col(ColumnDef::new(UserProfiles::Address).text().null())
                        .col(ColumnDef::new(UserProfiles::BirthDate).date().null())
                        .col(
                            ColumnDef::new(UserProfiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_profiles_user_id")
                                .from(UserProfiles::Table, UserProfiles::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RefreshTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RefreshTokens::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RefreshTokens::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(RefreshTokens::TokenHash)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::Revoked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_refresh_tokens_user_id")
                                .from(RefreshTokens::Table, RefreshTokens::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Username,
        Email,
        FirstName,
        LastName,
        PhoneNumber,
        Role,
        Status,
        PasswordHash,
        IsActive,
        DateJoined,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum UserProfiles {
        Table,
        Id,
        UserId,
        Avatar,
        Bio,
        Address,
        BirthDate,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RefreshTokens {
        Table,
        Id,
        UserId,
        TokenHash,
        ExpiresAt,
        Revoked,
        CreatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::Location).string().not_null())
                        .col(ColumnDef::new(Stores::Lat).double().null())
                        .col(ColumnDef::new(Stores::Lng).double().null())
                        .col(ColumnDef::new(Stores::OwnerName).string().not_null())
                        .col(ColumnDef::new(Stores::Email).string().null())
                        .col(ColumnDef::new(Stores::Number).string_len(32).not_null())
                        .col(ColumnDef::new(Stores::Day).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Stores::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Stores::ArchivedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Stores::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stores::UpdatedAt)
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
                        .name("idx_stores_name")
                        .table(Stores::Table)
                        .col(Stores::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::ContactPerson).string().null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::PhoneNumber).string_len(32).null())
                        .col(ColumnDef::new(Suppliers::Address).text().null())
                        .col(
                            ColumnDef::new(Suppliers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::ProductId)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Products::SupplierId).uuid().null())
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::CostPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Size).string_len(50).not_null())
                        .col(ColumnDef::new(Products::Barcode).string_len(100).null())
                        .col(
                            ColumnDef::new(Products::ReorderLevel)
                                .integer()
                                .not_null()
                                .default(10),
                        )
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category_id")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_supplier_id")
                                .from(Products::Table, Products::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category_id")
                        .table(Products::Table)
                        .col(Products::CategoryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
        Name,
        Location,
        Lat,
        Lng,
        OwnerName,
        Email,
        Number,
        Day,
        IsArchived,
        ArchivedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        Description,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
        Name,
        ContactPerson,
        Email,
        PhoneNumber,
        Address,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        ProductId,
        Name,
        Description,
        CategoryId,
        SupplierId,
        UnitPrice,
        CostPrice,
        Size,
        Barcode,
        ReorderLevel,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_inventory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Inventory::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Inventory::ProductId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Inventory::CurrentStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::LastUpdated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_product_id")
                                .from(Inventory::Table, Inventory::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::TransactionType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::PreviousStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::NewStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Reference)
                                .string_len(100)
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryTransactions::Reason).text().null())
                        .col(ColumnDef::new(InventoryTransactions::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(InventoryTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transactions_product_id")
                                .from(
                                    InventoryTransactions::Table,
                                    InventoryTransactions::ProductId,
                                )
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_transactions_created_at")
                        .table(InventoryTransactions::Table)
                        .col(InventoryTransactions::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductExpiries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductExpiries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductExpiries::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductExpiries::BatchNumber)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductExpiries::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductExpiries::ProductionDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductExpiries::ExpiryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductExpiries::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ProductExpiries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductExpiries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_expiries_product_id")
                                .from(ProductExpiries::Table, ProductExpiries::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_expiries_expiry_date")
                        .table(ProductExpiries::Table)
                        .col(ProductExpiries::ExpiryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductExpiries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Inventory {
        Table,
        Id,
        ProductId,
        CurrentStock,
        LastUpdated,
    }

    #[derive(DeriveIden)]
    enum InventoryTransactions {
        Table,
        Id,
        ProductId,
        TransactionType,
        Quantity,
        PreviousStock,
        NewStock,
        Reference,
        Reason,
        CreatedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductExpiries {
        Table,
        Id,
        ProductId,
        BatchNumber,
        Quantity,
        ProductionDate,
        ExpiryDate,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderId)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Orders::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Orders::DeliveryDay).string_len(16).null())
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Tax)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Total)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_store_id")
                                .from(Orders::Table, Orders::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_created_by")
                                .from(Orders::Table, Orders::CreatedBy)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::Total)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product_id")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderId,
        StoreId,
        CreatedBy,
        Status,
        DeliveryDay,
        Notes,
        Subtotal,
        Tax,
        Total,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
        UnitPrice,
        Total,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_delivery_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_delivery_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Deliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Deliveries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::DeliveryId)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Deliveries::EmployeeId).uuid().null())
                        .col(ColumnDef::new(Deliveries::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Deliveries::DeliveryDate).date().not_null())
                        .col(ColumnDef::new(Deliveries::DeliveryTime).time().not_null())
                        .col(ColumnDef::new(Deliveries::Notes).text().null())
                        .col(
                            ColumnDef::new(Deliveries::HasSignature)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Deliveries::SignaturePath).string().null())
                        .col(ColumnDef::new(Deliveries::Lat).double().null())
                        .col(ColumnDef::new(Deliveries::Lng).double().null())
                        .col(
                            ColumnDef::new(Deliveries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_deliveries_order_id")
                                .from(Deliveries::Table, Deliveries::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_deliveries_employee_id")
                                .from(Deliveries::Table, Deliveries::EmployeeId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_deliveries_delivery_date")
                        .table(Deliveries::Table)
                        .col(Deliveries::DeliveryDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryStatusUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryStatusUpdates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryStatusUpdates::DeliveryId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryStatusUpdates::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryStatusUpdates::Notes).text().null())
                        .col(
                            ColumnDef::new(DeliveryStatusUpdates::UpdateTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryStatusUpdates::UpdatedBy)
                                .uuid()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_status_updates_delivery_id")
                                .from(
                                    DeliveryStatusUpdates::Table,
                                    DeliveryStatusUpdates::DeliveryId,
                                )
                                .to(Deliveries::Table, Deliveries::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryStatusUpdates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Deliveries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Deliveries {
        Table,
        Id,
        DeliveryId,
        OrderId,
        EmployeeId,
        Status,
        DeliveryDate,
        DeliveryTime,
        Notes,
        HasSignature,
        SignaturePath,
        Lat,
        Lng,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryStatusUpdates {
        Table,
        Id,
        DeliveryId,
        Status,
        Notes,
        UpdateTime,
        UpdatedBy,
    }
}

mod m20240101_000006_create_dashboard_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_dashboard_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DashboardStats::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DashboardStats::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DashboardStats::Title).string_len(100).not_null())
                        .col(
                            ColumnDef::new(DashboardStats::StatType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DashboardStats::Period).string_len(16).not_null())
                        .col(
                            ColumnDef::new(DashboardStats::CurrentValue)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DashboardStats::PreviousValue)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DashboardStats::PercentageChange)
                                .decimal_len(8, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DashboardStats::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(DashboardStats::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DashboardStats::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RecentActivities::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RecentActivities::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecentActivities::ActivityType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecentActivities::Title)
                                .string_len(200)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecentActivities::Description)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecentActivities::ReferenceId)
                                .string_len(100)
                                .null(),
                        )
                        .col(ColumnDef::new(RecentActivities::UserId).uuid().null())
                        .col(
                            ColumnDef::new(RecentActivities::CreatedAt)
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
                        .name("idx_recent_activities_created_at")
                        .table(RecentActivities::Table)
                        .col(RecentActivities::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RecentActivities::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DashboardStats::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DashboardStats {
        Table,
        Id,
        Title,
        StatType,
        Period,
        CurrentValue,
        PreviousValue,
        PercentageChange,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RecentActivities {
        Table,
        Id,
        ActivityType,
        Title,
        Description,
        ReferenceId,
        UserId,
        CreatedAt,
    }
}
