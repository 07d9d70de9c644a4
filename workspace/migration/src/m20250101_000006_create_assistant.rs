use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_users::Users;
use crate::m20250101_000002_create_catalogue::Services;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AiConversations::Table)
                    .if_not_exists()
                    .col(pk_auto(AiConversations::Id))
                    .col(integer(AiConversations::UserId))
                    .col(string(AiConversations::SessionId).unique_key())
                    .col(string(AiConversations::Title).default(""))
                    .col(boolean(AiConversations::IsActive).default(true))
                    .col(timestamp_with_time_zone(AiConversations::CreatedAt))
                    .col(timestamp_with_time_zone(AiConversations::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_conversation_user")
                            .from(AiConversations::Table, AiConversations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AiMessages::Table)
                    .if_not_exists()
                    .col(pk_auto(AiMessages::Id))
                    .col(integer(AiMessages::ConversationId))
                    .col(string_len(AiMessages::MessageType, 20))
                    .col(text(AiMessages::Content))
                    .col(json(AiMessages::Metadata))
                    .col(integer(AiMessages::TokensUsed).default(0))
                    .col(big_integer(AiMessages::ResponseTimeMs).default(0))
                    .col(timestamp_with_time_zone(AiMessages::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_message_conversation")
                            .from(AiMessages::Table, AiMessages::ConversationId)
                            .to(AiConversations::Table, AiConversations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AiChatbotLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(AiChatbotLogs::Id))
                    .col(integer_null(AiChatbotLogs::UserId))
                    .col(string(AiChatbotLogs::SessionId))
                    .col(text(AiChatbotLogs::Query))
                    .col(text(AiChatbotLogs::Response))
                    .col(string_len(AiChatbotLogs::Intent, 100).default(""))
                    .col(json(AiChatbotLogs::Entities))
                    .col(double(AiChatbotLogs::Confidence).default(0.0))
                    .col(big_integer(AiChatbotLogs::ResponseTimeMs).default(0))
                    .col(timestamp_with_time_zone(AiChatbotLogs::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_chatbot_log_user")
                            .from(AiChatbotLogs::Table, AiChatbotLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AiServiceRecommendations::Table)
                    .if_not_exists()
                    .col(pk_auto(AiServiceRecommendations::Id))
                    .col(integer(AiServiceRecommendations::UserId))
                    .col(integer(AiServiceRecommendations::ServiceId))
                    .col(double(AiServiceRecommendations::ConfidenceScore).default(0.0))
                    .col(text(AiServiceRecommendations::Reason))
                    .col(json(AiServiceRecommendations::Context))
                    .col(boolean(AiServiceRecommendations::IsViewed).default(false))
                    .col(boolean(AiServiceRecommendations::IsClicked).default(false))
                    .col(timestamp_with_time_zone(AiServiceRecommendations::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_recommendation_user")
                            .from(AiServiceRecommendations::Table, AiServiceRecommendations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_recommendation_service")
                            .from(AiServiceRecommendations::Table, AiServiceRecommendations::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ai_recommendations_user_service")
                    .table(AiServiceRecommendations::Table)
                    .col(AiServiceRecommendations::UserId)
                    .col(AiServiceRecommendations::ServiceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AiSentimentAnalyses::Table)
                    .if_not_exists()
                    .col(pk_auto(AiSentimentAnalyses::Id))
                    .col(integer_null(AiSentimentAnalyses::UserId))
                    .col(text(AiSentimentAnalyses::Text))
                    .col(double(AiSentimentAnalyses::SentimentScore))
                    .col(string_len(AiSentimentAnalyses::SentimentLabel, 20))
                    .col(double(AiSentimentAnalyses::Confidence).default(0.0))
                    .col(json(AiSentimentAnalyses::Keywords))
                    .col(timestamp_with_time_zone(AiSentimentAnalyses::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_sentiment_user")
                            .from(AiSentimentAnalyses::Table, AiSentimentAnalyses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AiSentimentAnalyses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiServiceRecommendations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiChatbotLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiConversations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AiConversations {
    Table,
    Id,
    UserId,
    SessionId,
    Title,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AiMessages {
    Table,
    Id,
    ConversationId,
    MessageType,
    Content,
    Metadata,
    TokensUsed,
    ResponseTimeMs,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AiChatbotLogs {
    Table,
    Id,
    UserId,
    SessionId,
    Query,
    Response,
    Intent,
    Entities,
    Confidence,
    ResponseTimeMs,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AiServiceRecommendations {
    Table,
    Id,
    UserId,
    ServiceId,
    ConfidenceScore,
    Reason,
    Context,
    IsViewed,
    IsClicked,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AiSentimentAnalyses {
    Table,
    Id,
    UserId,
    Text,
    SentimentScore,
    SentimentLabel,
    Confidence,
    Keywords,
    CreatedAt,
}
