//! 核心表迁移
//!
//! - workspaces / workspace_tokens
//! - links（(domain, key) 唯一）
//! - tags / link_tags
//! - customers（(workspace_id, external_id) 唯一）

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Workspaces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Workspaces::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Workspaces::Slug)
                            .string_len(191)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Workspaces::Name).string_len(191).not_null())
                    .col(
                        ColumnDef::new(Workspaces::Usage)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Workspaces::LeadsUsage)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Workspaces::SalesUsage)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Workspaces::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkspaceTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkspaceTokens::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WorkspaceTokens::WorkspaceId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkspaceTokens::Name)
                            .string_len(191)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkspaceTokens::HashedKey)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(WorkspaceTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Links::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Links::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Links::Domain).string_len(191).not_null())
                    .col(ColumnDef::new(Links::Key).string_len(191).not_null())
                    .col(ColumnDef::new(Links::KeyLower).string_len(191).not_null())
                    .col(ColumnDef::new(Links::Url).text().not_null())
                    .col(ColumnDef::new(Links::WorkspaceId).string_len(64).null())
                    .col(
                        ColumnDef::new(Links::PublicStats)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Links::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Links::TrackConversion)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Links::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Links::ExpiredUrl).text().null())
                    .col(ColumnDef::new(Links::Ios).text().null())
                    .col(ColumnDef::new(Links::Android).text().null())
                    .col(ColumnDef::new(Links::Geo).text().null())
                    .col(ColumnDef::new(Links::ProgramId).string_len(64).null())
                    .col(ColumnDef::new(Links::PartnerId).string_len(64).null())
                    .col(ColumnDef::new(Links::FolderId).string_len(64).null())
                    .col(
                        ColumnDef::new(Links::Clicks)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Links::Leads)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Links::Sales)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Links::SaleAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Links::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Links::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // (domain, key) 忽略大小写后全局唯一；SQLite 的 LOWER() 只折叠 ASCII，
        // 折叠结果由应用写入 key_lower
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_domain_key_lower")
                    .table(Links::Table)
                    .col(Links::Domain)
                    .col(Links::KeyLower)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_workspace")
                    .table(Links::Table)
                    .col(Links::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tags::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tags::WorkspaceId).string_len(64).not_null())
                    .col(ColumnDef::new(Tags::Name).string_len(191).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LinkTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LinkTags::LinkId).string_len(64).not_null())
                    .col(ColumnDef::new(LinkTags::TagId).string_len(64).not_null())
                    .primary_key(Index::create().col(LinkTags::LinkId).col(LinkTags::TagId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Customers::WorkspaceId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Customers::ExternalId)
                            .string_len(191)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Customers::Name).string_len(191).null())
                    .col(ColumnDef::new(Customers::Email).string_len(191).null())
                    .col(ColumnDef::new(Customers::Avatar).text().null())
                    .col(ColumnDef::new(Customers::LinkId).string_len(64).null())
                    .col(ColumnDef::new(Customers::ClickId).string_len(64).null())
                    .col(ColumnDef::new(Customers::Country).string_len(8).null())
                    .col(
                        ColumnDef::new(Customers::CreatedAt)
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
                    .name("idx_customers_workspace_external")
                    .table(Customers::Table)
                    .col(Customers::WorkspaceId)
                    .col(Customers::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LinkTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Links::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WorkspaceTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workspaces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Workspaces {
    Table,
    Id,
    Slug,
    Name,
    Usage,
    LeadsUsage,
    SalesUsage,
    CreatedAt,
}

#[derive(DeriveIden)]
enum WorkspaceTokens {
    Table,
    Id,
    WorkspaceId,
    Name,
    HashedKey,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Links {
    Table,
    Id,
    Domain,
    Key,
    KeyLower,
    Url,
    WorkspaceId,
    PublicStats,
    Archived,
    TrackConversion,
    ExpiresAt,
    ExpiredUrl,
    Ios,
    Android,
    Geo,
    ProgramId,
    PartnerId,
    FolderId,
    Clicks,
    Leads,
    Sales,
    SaleAmount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    WorkspaceId,
    Name,
}

#[derive(DeriveIden)]
enum LinkTags {
    Table,
    LinkId,
    TagId,
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
    WorkspaceId,
    ExternalId,
    Name,
    Email,
    Avatar,
    LinkId,
    ClickId,
    Country,
    CreatedAt,
}
