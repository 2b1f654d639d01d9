//! 事件表迁移
//!
//! click_events / lead_events / sale_events 为只追加的事实表；
//! dead_letters 保存重试耗尽的后台任务。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickEvents::ClickId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ClickEvents::LinkId).string_len(64).not_null())
                    .col(ColumnDef::new(ClickEvents::WorkspaceId).string_len(64).null())
                    .col(ColumnDef::new(ClickEvents::Domain).string_len(191).not_null())
                    .col(ColumnDef::new(ClickEvents::Key).string_len(191).not_null())
                    .col(ColumnDef::new(ClickEvents::Url).text().not_null())
                    .col(ColumnDef::new(ClickEvents::Ip).string_len(45).not_null())
                    .col(ColumnDef::new(ClickEvents::Country).string_len(8).null())
                    .col(ColumnDef::new(ClickEvents::City).string_len(100).null())
                    .col(ColumnDef::new(ClickEvents::Region).string_len(100).null())
                    .col(ColumnDef::new(ClickEvents::Continent).string_len(8).null())
                    .col(ColumnDef::new(ClickEvents::Device).string_len(32).not_null())
                    .col(ColumnDef::new(ClickEvents::Browser).string_len(64).not_null())
                    .col(ColumnDef::new(ClickEvents::Os).string_len(64).not_null())
                    .col(
                        ColumnDef::new(ClickEvents::Bot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ClickEvents::UserAgent).text().null())
                    .col(ColumnDef::new(ClickEvents::Referer).string_len(191).not_null())
                    .col(ColumnDef::new(ClickEvents::RefererUrl).text().null())
                    .col(
                        ColumnDef::new(ClickEvents::Timestamp)
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
                    .name("idx_click_events_link_time")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::LinkId)
                    .col(ClickEvents::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeadEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeadEvents::EventId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeadEvents::EventName).string_len(191).not_null())
                    .col(ColumnDef::new(LeadEvents::CustomerId).string_len(64).not_null())
                    .col(ColumnDef::new(LeadEvents::ClickId).string_len(64).not_null())
                    .col(ColumnDef::new(LeadEvents::LinkId).string_len(64).not_null())
                    .col(ColumnDef::new(LeadEvents::WorkspaceId).string_len(64).not_null())
                    .col(ColumnDef::new(LeadEvents::Metadata).text().null())
                    .col(
                        ColumnDef::new(LeadEvents::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // getLeadEvent(customerId) 查询路径
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lead_events_customer")
                    .table(LeadEvents::Table)
                    .col(LeadEvents::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SaleEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SaleEvents::EventId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SaleEvents::EventName).string_len(191).not_null())
                    .col(ColumnDef::new(SaleEvents::CustomerId).string_len(64).not_null())
                    .col(ColumnDef::new(SaleEvents::ClickId).string_len(64).not_null())
                    .col(ColumnDef::new(SaleEvents::LinkId).string_len(64).not_null())
                    .col(ColumnDef::new(SaleEvents::WorkspaceId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(SaleEvents::PaymentProcessor)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SaleEvents::Amount).big_integer().not_null())
                    .col(ColumnDef::new(SaleEvents::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(SaleEvents::InvoiceId).string_len(191).null())
                    .col(ColumnDef::new(SaleEvents::Metadata).text().null())
                    .col(
                        ColumnDef::new(SaleEvents::Timestamp)
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
                    .name("idx_sale_events_customer")
                    .table(SaleEvents::Table)
                    .col(SaleEvents::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeadLetters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeadLetters::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeadLetters::JobKind).string_len(64).not_null())
                    .col(ColumnDef::new(DeadLetters::Payload).text().not_null())
                    .col(ColumnDef::new(DeadLetters::Error).text().not_null())
                    .col(ColumnDef::new(DeadLetters::Attempts).integer().not_null())
                    .col(
                        ColumnDef::new(DeadLetters::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeadLetters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SaleEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LeadEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClickEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickEvents {
    Table,
    ClickId,
    LinkId,
    WorkspaceId,
    Domain,
    Key,
    Url,
    Ip,
    Country,
    City,
    Region,
    Continent,
    Device,
    Browser,
    Os,
    Bot,
    UserAgent,
    Referer,
    RefererUrl,
    Timestamp,
}

#[derive(DeriveIden)]
enum LeadEvents {
    Table,
    EventId,
    EventName,
    CustomerId,
    ClickId,
    LinkId,
    WorkspaceId,
    Metadata,
    Timestamp,
}

#[derive(DeriveIden)]
enum SaleEvents {
    Table,
    EventId,
    EventName,
    CustomerId,
    ClickId,
    LinkId,
    WorkspaceId,
    PaymentProcessor,
    Amount,
    Currency,
    InvoiceId,
    Metadata,
    Timestamp,
}

#[derive(DeriveIden)]
enum DeadLetters {
    Table,
    Id,
    JobKind,
    Payload,
    Error,
    Attempts,
    CreatedAt,
}
