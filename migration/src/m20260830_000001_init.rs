use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========== OWNERS ==========
        manager
            .create_table(
                Table::create()
                    .table(Owners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Owners::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(Owners::DisplayName).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Owners::ContactEmail)
                            .string_len(254)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Owners::AlertThreshold)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Owners::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(Owners::UpdatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .to_owned(),
            )
            .await?;

        // Threshold is a count, never negative
        manager
            .get_connection()
            .execute_unprepared(
                "ALTER TABLE owners ADD CONSTRAINT owners_alert_threshold_nonneg CHECK (alert_threshold >= 0)",
            )
            .await?;

        // ========== DEVICES ==========
        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Devices::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(Devices::OwnerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Devices::DeviceIdentifier)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Devices::Credential)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Devices::DisplayName).string_len(200).not_null())
                    .col(ColumnDef::new(Devices::Location).string_len(300))
                    .col(
                        ColumnDef::new(Devices::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Devices::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(Devices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_devices_owner")
                            .from(Devices::Table, Devices::OwnerId)
                            .to(Owners::Table, Owners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_devices_owner")
                    .table(Devices::Table)
                    .col(Devices::OwnerId)
                    .to_owned(),
            )
            .await?;

        // Authentication does a single lookup on (identifier, credential, active)
        manager
            .create_index(
                Index::create()
                    .name("idx_devices_identifier_credential")
                    .table(Devices::Table)
                    .col(Devices::DeviceIdentifier)
                    .col(Devices::Credential)
                    .to_owned(),
            )
            .await?;

        // ========== READINGS ==========
        manager
            .create_table(
                Table::create()
                    .table(Readings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Readings::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(Readings::DeviceId).uuid().not_null())
                    .col(
                        ColumnDef::new(Readings::ObservedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Readings::Temperature).double().not_null())
                    .col(ColumnDef::new(Readings::Humidity).double().not_null())
                    .col(ColumnDef::new(Readings::SoilMoisture).double())
                    .col(
                        ColumnDef::new(Readings::PestCountPrimary)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Readings::PestCountSecondary)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Readings::RainfallDetected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Readings::IrrigationActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Readings::ModelConfidence).double())
                    .col(
                        ColumnDef::new(Readings::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_readings_device")
                            .from(Readings::Table, Readings::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "ALTER TABLE readings ADD CONSTRAINT readings_pest_counts_nonneg CHECK (pest_count_primary >= 0 AND pest_count_secondary >= 0)",
            )
            .await?;

        // Dashboard and latest-per-device queries scan newest-first per device
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX idx_readings_device_observed ON readings (device_id, observed_at DESC)",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_readings_observed")
                    .table(Readings::Table)
                    .col(Readings::ObservedAt)
                    .to_owned(),
            )
            .await?;

        // ========== ALERT LOGS ==========
        manager
            .create_table(
                Table::create()
                    .table(AlertLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AlertLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(AlertLogs::ReadingId).uuid().not_null())
                    .col(
                        ColumnDef::new(AlertLogs::AlertKind)
                            .string_len(50)
                            .not_null()
                            .default("threshold"),
                    )
                    .col(ColumnDef::new(AlertLogs::Message).text().not_null())
                    .col(
                        ColumnDef::new(AlertLogs::DispatchedTo)
                            .string_len(254)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertLogs::DispatchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alert_logs_reading")
                            .from(AlertLogs::Table, AlertLogs::ReadingId)
                            .to(Readings::Table, Readings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one alert per reading; duplicate evaluations resolve at the
        // storage layer, not in application code
        manager
            .create_index(
                Index::create()
                    .name("idx_alert_logs_reading_unique")
                    .table(AlertLogs::Table)
                    .col(AlertLogs::ReadingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alert_logs_dispatched")
                    .table(AlertLogs::Table)
                    .col(AlertLogs::DispatchedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order of dependencies
        manager
            .drop_table(Table::drop().table(AlertLogs::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Readings::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Devices::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Owners::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Owners {
    Table,
    Id,
    DisplayName,
    ContactEmail,
    AlertThreshold,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Devices {
    Table,
    Id,
    OwnerId,
    DeviceIdentifier,
    Credential,
    DisplayName,
    Location,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Readings {
    Table,
    Id,
    DeviceId,
    ObservedAt,
    Temperature,
    Humidity,
    SoilMoisture,
    PestCountPrimary,
    PestCountSecondary,
    RainfallDetected,
    IrrigationActive,
    ModelConfidence,
    RecordedAt,
}

#[derive(DeriveIden)]
enum AlertLogs {
    Table,
    Id,
    ReadingId,
    AlertKind,
    Message,
    DispatchedTo,
    DispatchedAt,
}
