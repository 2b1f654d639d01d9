//! 合作伙伴计划相关表
//!
//! programs / partners / program_enrollments / rewards / sales / payouts

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Programs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Programs::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Programs::WorkspaceId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Programs::Name).string_len(191).not_null())
                    .col(
                        ColumnDef::new(Programs::Slug)
                            .string_len(191)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Programs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Partners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Partners::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Partners::Name).string_len(191).not_null())
                    .col(ColumnDef::new(Partners::Email).string_len(191).null())
                    .col(
                        ColumnDef::new(Partners::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProgramEnrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProgramEnrollments::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProgramEnrollments::ProgramId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProgramEnrollments::PartnerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProgramEnrollments::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProgramEnrollments::CreatedAt)
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
                    .name("idx_enrollments_program_partner")
                    .table(ProgramEnrollments::Table)
                    .col(ProgramEnrollments::ProgramId)
                    .col(ProgramEnrollments::PartnerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rewards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rewards::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rewards::ProgramId).string_len(64).not_null())
                    .col(ColumnDef::new(Rewards::PartnerId).string_len(64).null())
                    .col(ColumnDef::new(Rewards::Event).string_len(32).not_null())
                    .col(ColumnDef::new(Rewards::Kind).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Rewards::Amount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Rewards::CreatedAt)
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
                    .name("idx_rewards_program_event")
                    .table(Rewards::Table)
                    .col(Rewards::ProgramId)
                    .col(Rewards::Event)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sales::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sales::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sales::ProgramId).string_len(64).not_null())
                    .col(ColumnDef::new(Sales::PartnerId).string_len(64).not_null())
                    .col(ColumnDef::new(Sales::LinkId).string_len(64).not_null())
                    .col(ColumnDef::new(Sales::CustomerId).string_len(64).not_null())
                    .col(ColumnDef::new(Sales::EventId).string_len(64).not_null())
                    .col(ColumnDef::new(Sales::InvoiceId).string_len(191).null())
                    .col(ColumnDef::new(Sales::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Sales::Earnings).big_integer().not_null())
                    .col(ColumnDef::new(Sales::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(Sales::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Sales::PayoutId).string_len(64).null())
                    .col(
                        ColumnDef::new(Sales::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sales::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 聚合 payout 时的查询路径
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sales_program_partner_status")
                    .table(Sales::Table)
                    .col(Sales::ProgramId)
                    .col(Sales::PartnerId)
                    .col(Sales::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sales_payout")
                    .table(Sales::Table)
                    .col(Sales::PayoutId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payouts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payouts::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payouts::ProgramId).string_len(64).not_null())
                    .col(ColumnDef::new(Payouts::PartnerId).string_len(64).not_null())
                    .col(ColumnDef::new(Payouts::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Payouts::Fee).big_integer().not_null())
                    .col(ColumnDef::new(Payouts::Total).big_integer().not_null())
                    .col(ColumnDef::new(Payouts::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(Payouts::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Payouts::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Payouts::Description).string_len(255).null())
                    .col(ColumnDef::new(Payouts::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(Payouts::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payouts::PeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payouts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payouts::UpdatedAt)
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
                    .name("idx_payouts_program_partner")
                    .table(Payouts::Table)
                    .col(Payouts::ProgramId)
                    .col(Payouts::PartnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payouts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sales::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rewards::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProgramEnrollments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Partners::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Programs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Programs {
    Table,
    Id,
    WorkspaceId,
    Name,
    Slug,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Partners {
    Table,
    Id,
    Name,
    Email,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProgramEnrollments {
    Table,
    Id,
    ProgramId,
    PartnerId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Rewards {
    Table,
    Id,
    ProgramId,
    PartnerId,
    Event,
    Kind,
    Amount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Sales {
    Table,
    Id,
    ProgramId,
    PartnerId,
    LinkId,
    CustomerId,
    EventId,
    InvoiceId,
    Amount,
    Earnings,
    Currency,
    Status,
    PayoutId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Payouts {
    Table,
    Id,
    ProgramId,
    PartnerId,
    Amount,
    Fee,
    Total,
    Currency,
    Status,
    Kind,
    Description,
    Quantity,
    PeriodStart,
    PeriodEnd,
    CreatedAt,
    UpdatedAt,
}
