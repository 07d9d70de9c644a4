use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_users::Users;
use crate::m20250101_000002_create_catalogue::{ServiceItems, Services};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(pk_auto(Bookings::Id))
                    .col(integer(Bookings::ServiceId))
                    .col(integer(Bookings::StudentId))
                    .col(timestamp_with_time_zone(Bookings::BookingDate))
                    .col(string_len(Bookings::BookingStatus, 20).default("pending"))
                    .col(text_null(Bookings::Notes))
                    .col(timestamp_with_time_zone(Bookings::CreatedAt))
                    .col(timestamp_with_time_zone(Bookings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_service")
                            .from(Bookings::Table, Bookings::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_student")
                            .from(Bookings::Table, Bookings::StudentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One booking per service and instant.
        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_service_date")
                    .table(Bookings::Table)
                    .col(Bookings::ServiceId)
                    .col(Bookings::BookingDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(pk_auto(Orders::Id))
                    .col(integer(Orders::ServiceId))
                    .col(integer(Orders::CustomerId))
                    .col(text_null(Orders::SpecialInstructions))
                    .col(string_null(Orders::DeliveryAddress))
                    .col(string_len(Orders::OrderStatus, 20).default("pending"))
                    .col(decimal_len(Orders::TotalAmount, 10, 2).default(0))
                    .col(timestamp_with_time_zone(Orders::CreatedAt))
                    .col(timestamp_with_time_zone(Orders::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_service")
                            .from(Orders::Table, Orders::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_customer")
                            .from(Orders::Table, Orders::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(pk_auto(OrderItems::Id))
                    .col(integer(OrderItems::OrderId))
                    .col(integer(OrderItems::ServiceItemId))
                    .col(integer(OrderItems::Quantity).default(1))
                    .col(decimal_len(OrderItems::UnitPrice, 10, 2))
                    .col(decimal_len(OrderItems::TotalPrice, 10, 2))
                    .col(timestamp_with_time_zone(OrderItems::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_item_order")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_item_service_item")
                            .from(OrderItems::Table, OrderItems::ServiceItemId)
                            .to(ServiceItems::Table, ServiceItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(pk_auto(Payments::Id))
                    .col(integer(Payments::PayerId))
                    .col(integer_null(Payments::BookingId))
                    .col(integer_null(Payments::OrderId))
                    .col(decimal_len(Payments::Amount, 10, 2))
                    .col(string_len(Payments::Currency, 3).default("GHS"))
                    .col(string_len(Payments::PaymentMethod, 20))
                    .col(string_len_null(Payments::MobileMoneyProvider, 20))
                    .col(string_len(Payments::TransactionId, 100).unique_key())
                    .col(string_len(Payments::Status, 20).default("pending"))
                    .col(string_len_null(Payments::PhoneNumber, 20))
                    .col(string_null(Payments::ReferenceNumber))
                    .col(text_null(Payments::PaymentNotes))
                    .col(timestamp_with_time_zone(Payments::CreatedAt))
                    .col(timestamp_with_time_zone(Payments::UpdatedAt))
                    .check(Expr::cust("(booking_id IS NOT NULL) <> (order_id IS NOT NULL)"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_payer")
                            .from(Payments::Table, Payments::PayerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_booking")
                            .from(Payments::Table, Payments::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_order")
                            .from(Payments::Table, Payments::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(pk_auto(Reviews::Id))
                    .col(integer(Reviews::ServiceId))
                    .col(integer(Reviews::UserId))
                    .col(integer(Reviews::Rating))
                    .col(text_null(Reviews::Comment))
                    .col(timestamp_with_time_zone(Reviews::CreatedAt))
                    .col(timestamp_with_time_zone(Reviews::UpdatedAt))
                    .check(Expr::cust("rating BETWEEN 1 AND 5"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_service")
                            .from(Reviews::Table, Reviews::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_user")
                            .from(Reviews::Table, Reviews::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_service_user")
                    .table(Reviews::Table)
                    .col(Reviews::ServiceId)
                    .col(Reviews::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Reviews::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Payments::Table).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Orders::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Bookings::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub enum Bookings {
    Table,
    Id,
    ServiceId,
    StudentId,
    BookingDate,
    BookingStatus,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    ServiceId,
    CustomerId,
    SpecialInstructions,
    DeliveryAddress,
    OrderStatus,
    TotalAmount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    ServiceItemId,
    Quantity,
    UnitPrice,
    TotalPrice,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    PayerId,
    BookingId,
    OrderId,
    Amount,
    Currency,
    PaymentMethod,
    MobileMoneyProvider,
    TransactionId,
    Status,
    PhoneNumber,
    ReferenceNumber,
    PaymentNotes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    ServiceId,
    UserId,
    Rating,
    Comment,
    CreatedAt,
    UpdatedAt,
}
