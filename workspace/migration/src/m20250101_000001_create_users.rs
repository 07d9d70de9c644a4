use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 150).unique_key())
                    .col(string(Users::Email).unique_key())
                    .col(string_len_null(Users::PhoneNumber, 20).unique_key())
                    .col(string_null(Users::FirstName))
                    .col(string_null(Users::LastName))
                    .col(string_null(Users::ProfilePicture))
                    .col(string_len(Users::UserType, 20).default("student"))
                    .col(string(Users::PasswordHash))
                    .col(boolean(Users::IsActive).default(true))
                    .col(timestamp_with_time_zone(Users::DateJoined))
                    .col(timestamp_with_time_zone_null(Users::LastLogin))
                    .to_owned(),
            )
            .await?;

        // Refresh tokens that were rotated or logged out.
        manager
            .create_table(
                Table::create()
                    .table(BlacklistedTokens::Table)
                    .if_not_exists()
                    .col(pk_auto(BlacklistedTokens::Id))
                    .col(text(BlacklistedTokens::Token).unique_key())
                    .col(integer(BlacklistedTokens::UserId))
                    .col(timestamp_with_time_zone(BlacklistedTokens::BlacklistedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blacklisted_token_user")
                            .from(BlacklistedTokens::Table, BlacklistedTokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlacklistedTokens::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Username,
    Email,
    PhoneNumber,
    FirstName,
    LastName,
    ProfilePicture,
    UserType,
    PasswordHash,
    IsActive,
    DateJoined,
    LastLogin,
}

#[derive(DeriveIden)]
enum BlacklistedTokens {
    Table,
    Id,
    Token,
    UserId,
    BlacklistedAt,
}
