use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_auto(Notifications::Id))
                    .col(integer(Notifications::UserId))
                    .col(string_len(Notifications::Title, 200))
                    .col(text(Notifications::Message))
                    .col(string_len(Notifications::NotificationType, 30).default("general"))
                    .col(string_len(Notifications::Priority, 10).default("medium"))
                    .col(string_len_null(Notifications::RelatedObjectType, 50))
                    .col(integer_null(Notifications::RelatedObjectId))
                    .col(integer_null(Notifications::RelatedServiceId))
                    .col(integer_null(Notifications::RelatedBookingId))
                    .col(integer_null(Notifications::RelatedOrderId))
                    .col(boolean(Notifications::IsRead).default(false))
                    .col(boolean(Notifications::IsSent).default(false))
                    .col(boolean(Notifications::IsDelivered).default(false))
                    .col(boolean(Notifications::SendEmail).default(false))
                    .col(boolean(Notifications::SendPush).default(true))
                    .col(boolean(Notifications::SendSms).default(false))
                    .col(json(Notifications::Metadata))
                    .col(string_null(Notifications::ActionUrl))
                    .col(string_len_null(Notifications::ActionText, 50))
                    .col(timestamp_with_time_zone(Notifications::CreatedAt))
                    .col(timestamp_with_time_zone_null(Notifications::ReadAt))
                    .col(timestamp_with_time_zone_null(Notifications::SentAt))
                    .col(timestamp_with_time_zone_null(Notifications::DeliveredAt))
                    .col(timestamp_with_time_zone_null(Notifications::ExpiresAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_read")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::IsRead)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationTemplates::Table)
                    .if_not_exists()
                    .col(pk_auto(NotificationTemplates::Id))
                    .col(string_len(NotificationTemplates::Name, 100).unique_key())
                    .col(string_len(NotificationTemplates::NotificationType, 30))
                    .col(string_len(NotificationTemplates::TitleTemplate, 200))
                    .col(text(NotificationTemplates::MessageTemplate))
                    .col(string_len(NotificationTemplates::DefaultPriority, 10).default("medium"))
                    .col(boolean(NotificationTemplates::DefaultSendEmail).default(false))
                    .col(boolean(NotificationTemplates::DefaultSendPush).default(true))
                    .col(boolean(NotificationTemplates::DefaultSendSms).default(false))
                    .col(integer(NotificationTemplates::DefaultExpiryHours).default(24))
                    .col(boolean(NotificationTemplates::IsActive).default(true))
                    .col(timestamp_with_time_zone(NotificationTemplates::CreatedAt))
                    .col(timestamp_with_time_zone(NotificationTemplates::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationPreferences::Table)
                    .if_not_exists()
                    .col(pk_auto(NotificationPreferences::Id))
                    .col(integer(NotificationPreferences::UserId).unique_key())
                    .col(boolean(NotificationPreferences::EmailEnabled).default(true))
                    .col(boolean(NotificationPreferences::EmailOrderUpdates).default(true))
                    .col(boolean(NotificationPreferences::EmailBookingUpdates).default(true))
                    .col(boolean(NotificationPreferences::EmailPaymentUpdates).default(true))
                    .col(boolean(NotificationPreferences::EmailRecommendations).default(true))
                    .col(boolean(NotificationPreferences::EmailAnnouncements).default(true))
                    .col(boolean(NotificationPreferences::PushEnabled).default(true))
                    .col(boolean(NotificationPreferences::PushOrderUpdates).default(true))
                    .col(boolean(NotificationPreferences::PushBookingUpdates).default(true))
                    .col(boolean(NotificationPreferences::PushPaymentUpdates).default(true))
                    .col(boolean(NotificationPreferences::PushRecommendations).default(true))
                    .col(boolean(NotificationPreferences::PushAnnouncements).default(true))
                    .col(boolean(NotificationPreferences::SmsEnabled).default(false))
                    .col(boolean(NotificationPreferences::SmsOrderUpdates).default(false))
                    .col(boolean(NotificationPreferences::SmsBookingUpdates).default(false))
                    .col(boolean(NotificationPreferences::SmsPaymentUpdates).default(false))
                    .col(boolean(NotificationPreferences::QuietHoursEnabled).default(false))
                    .col(time_null(NotificationPreferences::QuietHoursStart))
                    .col(time_null(NotificationPreferences::QuietHoursEnd))
                    .col(integer(NotificationPreferences::MaxNotificationsPerHour).default(10))
                    .col(integer(NotificationPreferences::MaxNotificationsPerDay).default(50))
                    .col(timestamp_with_time_zone(NotificationPreferences::CreatedAt))
                    .col(timestamp_with_time_zone(NotificationPreferences::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_preference_user")
                            .from(NotificationPreferences::Table, NotificationPreferences::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationDeliveryLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(NotificationDeliveryLogs::Id))
                    .col(integer(NotificationDeliveryLogs::NotificationId))
                    .col(string_len(NotificationDeliveryLogs::Channel, 20))
                    .col(string_len(NotificationDeliveryLogs::Status, 20).default("pending"))
                    .col(string_len_null(NotificationDeliveryLogs::Provider, 50))
                    .col(text_null(NotificationDeliveryLogs::ErrorMessage))
                    .col(timestamp_with_time_zone(NotificationDeliveryLogs::AttemptedAt))
                    .col(timestamp_with_time_zone_null(NotificationDeliveryLogs::DeliveredAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_log_notification")
                            .from(NotificationDeliveryLogs::Table, NotificationDeliveryLogs::NotificationId)
                            .to(Notifications::Table, Notifications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationDeliveryLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NotificationPreferences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NotificationTemplates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Title,
    Message,
    NotificationType,
    Priority,
    RelatedObjectType,
    RelatedObjectId,
    RelatedServiceId,
    RelatedBookingId,
    RelatedOrderId,
    IsRead,
    IsSent,
    IsDelivered,
    SendEmail,
    SendPush,
    SendSms,
    Metadata,
    ActionUrl,
    ActionText,
    CreatedAt,
    ReadAt,
    SentAt,
    DeliveredAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum NotificationTemplates {
    Table,
    Id,
    Name,
    NotificationType,
    TitleTemplate,
    MessageTemplate,
    DefaultPriority,
    DefaultSendEmail,
    DefaultSendPush,
    DefaultSendSms,
    DefaultExpiryHours,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NotificationPreferences {
    Table,
    Id,
    UserId,
    EmailEnabled,
    EmailOrderUpdates,
    EmailBookingUpdates,
    EmailPaymentUpdates,
    EmailRecommendations,
    EmailAnnouncements,
    PushEnabled,
    PushOrderUpdates,
    PushBookingUpdates,
    PushPaymentUpdates,
    PushRecommendations,
    PushAnnouncements,
    SmsEnabled,
    SmsOrderUpdates,
    SmsBookingUpdates,
    SmsPaymentUpdates,
    QuietHoursEnabled,
    QuietHoursStart,
    QuietHoursEnd,
    MaxNotificationsPerHour,
    MaxNotificationsPerDay,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NotificationDeliveryLogs {
    Table,
    Id,
    NotificationId,
    Channel,
    Status,
    Provider,
    ErrorMessage,
    AttemptedAt,
    DeliveredAt,
}
