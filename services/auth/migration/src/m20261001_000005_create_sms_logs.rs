use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SmsLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SmsLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SmsLogs::Phone).string().not_null())
                    .col(ColumnDef::new(SmsLogs::Message).text().not_null())
                    .col(ColumnDef::new(SmsLogs::Provider).string().not_null())
                    .col(ColumnDef::new(SmsLogs::Status).string().not_null())
                    .col(ColumnDef::new(SmsLogs::ProviderMessageId).string())
                    .col(ColumnDef::new(SmsLogs::Cost).double())
                    .col(ColumnDef::new(SmsLogs::ErrorMessage).text())
                    .col(
                        ColumnDef::new(SmsLogs::TestMode)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SmsLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Cost/delivery reconciliation scans by phone and time.
        manager
            .create_index(
                Index::create()
                    .table(SmsLogs::Table)
                    .col(SmsLogs::Phone)
                    .col(SmsLogs::CreatedAt)
                    .name("idx_sms_logs_phone_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SmsLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SmsLogs {
    Table,
    Id,
    Phone,
    Message,
    Provider,
    Status,
    ProviderMessageId,
    Cost,
    ErrorMessage,
    TestMode,
    CreatedAt,
}
