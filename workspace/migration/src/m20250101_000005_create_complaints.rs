use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_users::Users;
use crate::m20250101_000002_create_catalogue::Services;
use crate::m20250101_000003_create_transactions::{Bookings, Orders};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Complaints::Table)
                    .if_not_exists()
                    .col(pk_auto(Complaints::Id))
                    .col(integer(Complaints::ComplainantId))
                    .col(string_len(Complaints::ComplaintType, 20))
                    .col(integer_null(Complaints::RelatedServiceId))
                    .col(integer_null(Complaints::RelatedOrderId))
                    .col(integer_null(Complaints::RelatedBookingId))
                    .col(string_len(Complaints::Subject, 200))
                    .col(text(Complaints::Description))
                    .col(string_len(Complaints::Status, 20).default("pending"))
                    .col(string_len(Complaints::Priority, 10).default("medium"))
                    .col(text_null(Complaints::AdminResponse))
                    .col(timestamp_with_time_zone_null(Complaints::ResolvedAt))
                    .col(integer_null(Complaints::AssignedAdminId))
                    .col(timestamp_with_time_zone(Complaints::CreatedAt))
                    .col(timestamp_with_time_zone(Complaints::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_complainant")
                            .from(Complaints::Table, Complaints::ComplainantId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_assigned_admin")
                            .from(Complaints::Table, Complaints::AssignedAdminId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_service")
                            .from(Complaints::Table, Complaints::RelatedServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_order")
                            .from(Complaints::Table, Complaints::RelatedOrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_booking")
                            .from(Complaints::Table, Complaints::RelatedBookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Complaints::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Complaints {
    Table,
    Id,
    ComplainantId,
    ComplaintType,
    RelatedServiceId,
    RelatedOrderId,
    RelatedBookingId,
    Subject,
    Description,
    Status,
    Priority,
    AdminResponse,
    ResolvedAt,
    AssignedAdminId,
    CreatedAt,
    UpdatedAt,
}
