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
                    .table(VendorApplications::Table)
                    .if_not_exists()
                    .col(pk_auto(VendorApplications::Id))
                    .col(integer(VendorApplications::ApplicantId).unique_key())
                    .col(string_len(VendorApplications::BusinessName, 200))
                    .col(text(VendorApplications::BusinessDescription))
                    .col(string_len(VendorApplications::Category, 20))
                    .col(string(VendorApplications::Address))
                    .col(string_len_null(VendorApplications::Phone, 20))
                    .col(string_null(VendorApplications::Email))
                    .col(string_null(VendorApplications::Website))
                    .col(text_null(VendorApplications::Experience))
                    .col(text_null(VendorApplications::Reason))
                    .col(string_len(VendorApplications::Status, 20).default("pending"))
                    .col(text_null(VendorApplications::Notes))
                    .col(integer_null(VendorApplications::ReviewedBy))
                    .col(timestamp_with_time_zone(VendorApplications::SubmittedAt))
                    .col(timestamp_with_time_zone_null(VendorApplications::ReviewedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vendor_application_applicant")
                            .from(VendorApplications::Table, VendorApplications::ApplicantId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vendor_application_reviewer")
                            .from(VendorApplications::Table, VendorApplications::ReviewedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VendorProfiles::Table)
                    .if_not_exists()
                    .col(pk_auto(VendorProfiles::Id))
                    .col(integer(VendorProfiles::UserId).unique_key())
                    .col(string_len(VendorProfiles::BusinessName, 200))
                    .col(text_null(VendorProfiles::Description))
                    .col(string_null(VendorProfiles::BusinessHours))
                    .col(string_null(VendorProfiles::Address))
                    .col(string_len_null(VendorProfiles::Phone, 20))
                    .col(string_null(VendorProfiles::Email))
                    .col(string_null(VendorProfiles::Website))
                    .col(boolean(VendorProfiles::IsVerified).default(false))
                    .col(boolean(VendorProfiles::IsActive).default(true))
                    .col(string_len_null(VendorProfiles::MtnMomoNumber, 20))
                    .col(string_len_null(VendorProfiles::VodafoneCashNumber, 20))
                    .col(string_len_null(VendorProfiles::AirtelMoneyNumber, 20))
                    .col(string_len_null(VendorProfiles::TelecelCashNumber, 20))
                    .col(string_len(VendorProfiles::PreferredPaymentMethod, 20).default("mtn_momo"))
                    .col(timestamp_with_time_zone(VendorProfiles::CreatedAt))
                    .col(timestamp_with_time_zone(VendorProfiles::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vendor_profile_user")
                            .from(VendorProfiles::Table, VendorProfiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Services::Table)
                    .if_not_exists()
                    .col(pk_auto(Services::Id))
                    .col(integer(Services::VendorId))
                    .col(string_len(Services::ServiceName, 200))
                    .col(text(Services::Description))
                    .col(string_len(Services::Category, 20))
                    .col(string_len(Services::ServiceType, 20).default("contact"))
                    .col(decimal_len_null(Services::BasePrice, 10, 2))
                    .col(boolean(Services::HasFlexiblePricing).default(false))
                    .col(boolean(Services::IsAvailable).default(true))
                    .col(string_len(Services::AvailabilityStatus, 20).default("available"))
                    .col(text_null(Services::ContactInfo))
                    .col(string_null(Services::Location))
                    .col(string_null(Services::ImageUrl))
                    .col(decimal_len_null(Services::Rating, 3, 2))
                    .col(integer(Services::TotalRatings).default(0))
                    .col(boolean(Services::SupportsBooking).default(false))
                    .col(boolean(Services::SupportsOrdering).default(false))
                    .col(boolean(Services::SupportsWalkIn).default(false))
                    .col(boolean(Services::RequiresContact).default(true))
                    .col(timestamp_with_time_zone(Services::CreatedAt))
                    .col(timestamp_with_time_zone(Services::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_vendor")
                            .from(Services::Table, Services::VendorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_services_vendor_name")
                    .table(Services::Table)
                    .col(Services::VendorId)
                    .col(Services::ServiceName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServiceItems::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceItems::Id))
                    .col(integer(ServiceItems::ServiceId))
                    .col(string_len(ServiceItems::Name, 200))
                    .col(text_null(ServiceItems::Description))
                    .col(decimal_len(ServiceItems::Price, 10, 2))
                    .col(string_null(ServiceItems::ImageUrl))
                    .col(boolean(ServiceItems::IsAvailable).default(true))
                    .col(timestamp_with_time_zone(ServiceItems::CreatedAt))
                    .col(timestamp_with_time_zone(ServiceItems::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_item_service")
                            .from(ServiceItems::Table, ServiceItems::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_service_items_service_name")
                    .table(ServiceItems::Table)
                    .col(ServiceItems::ServiceId)
                    .col(ServiceItems::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServiceItems::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Services::Table).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(VendorProfiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VendorApplications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VendorApplications {
    Table,
    Id,
    ApplicantId,
    BusinessName,
    BusinessDescription,
    Category,
    Address,
    Phone,
    Email,
    Website,
    Experience,
    Reason,
    Status,
    Notes,
    ReviewedBy,
    SubmittedAt,
    ReviewedAt,
}

#[derive(DeriveIden)]
enum VendorProfiles {
    Table,
    Id,
    UserId,
    BusinessName,
    Description,
    BusinessHours,
    Address,
    Phone,
    Email,
    Website,
    IsVerified,
    IsActive,
    MtnMomoNumber,
    VodafoneCashNumber,
    AirtelMoneyNumber,
    TelecelCashNumber,
    PreferredPaymentMethod,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Services {
    Table,
    Id,
    VendorId,
    ServiceName,
    Description,
    Category,
    ServiceType,
    BasePrice,
    HasFlexiblePricing,
    IsAvailable,
    AvailabilityStatus,
    ContactInfo,
    Location,
    ImageUrl,
    Rating,
    TotalRatings,
    SupportsBooking,
    SupportsOrdering,
    SupportsWalkIn,
    RequiresContact,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ServiceItems {
    Table,
    Id,
    ServiceId,
    Name,
    Description,
    Price,
    ImageUrl,
    IsAvailable,
    CreatedAt,
    UpdatedAt,
}
