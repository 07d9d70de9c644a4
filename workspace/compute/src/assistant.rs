//! Rule-based chat assistant: keyword intent detection, canned replies,
//! word-list sentiment and popularity-based service recommendations.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use common::AssistantAnalytics;
use model::entities::ai_message::MessageType;
use model::entities::service::ServiceType;
use model::entities::{
    ai_chatbot_log, ai_conversation, ai_message, ai_sentiment_analysis, ai_service_recommendation, booking, order,
    service, user,
};
use model::money::two_places;

use crate::error::{ComputeError, Result};

/// Fixed confidence reported for every rule-based reply.
pub const REPLY_CONFIDENCE: f64 = 0.8;
const SEARCH_RESULT_LIMIT: u64 = 3;
const RECOMMENDATION_CANDIDATES: u64 = 5;
const MAX_KEYWORDS: usize = 10;

const POSITIVE_WORDS: [&str; 8] = ["good", "great", "excellent", "amazing", "wonderful", "fantastic", "love", "perfect"];
const NEGATIVE_WORDS: [&str; 8] = ["bad", "terrible", "awful", "hate", "worst", "horrible", "disappointing", "poor"];
const STOP_WORDS: [&str; 30] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is", "are", "was",
    "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would", "could", "should",
];

const GENERAL_REPLIES: [&str; 4] = [
    "I'm here to help! How can I assist you today?",
    "I can help you find services, make bookings, check orders, or answer questions about payments. What would you like to know?",
    "Hello! I'm your AI assistant. I can help you navigate our platform and find what you need.",
    "I'm here to help! Feel free to ask me about our services, bookings, orders, or anything else you need assistance with.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ServiceSearch,
    Booking,
    Payment,
    OrderStatus,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ServiceSearch => "service_search",
            Intent::Booking => "booking",
            Intent::Payment => "payment",
            Intent::OrderStatus => "order_status",
            Intent::General => "general",
        }
    }

    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Intent::ServiceSearch => vec![
                "Show me laundry services",
                "Find food services",
                "What printing services are available?",
            ],
            Intent::Booking => vec!["Book an appointment", "Check my bookings", "Cancel a booking"],
            Intent::Payment => vec![
                "How do I pay?",
                "What payment methods are accepted?",
                "Check my payment history",
            ],
            Intent::OrderStatus | Intent::General => {
                vec!["Find services", "Make a booking", "Check my orders", "Payment help"]
            }
        }
    }
}

/// Intent plus the service type mentioned alongside a search, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub intent: Intent,
    pub service_type: Option<&'static str>,
}

impl Detection {
    pub fn entities(&self) -> Value {
        match self.service_type {
            Some(service_type) => json!({ "service_type": service_type }),
            None => json!({}),
        }
    }
}

fn mentions_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}

/// Case-insensitive keyword match; the first matching rule wins.
pub fn detect_intent(message: &str) -> Detection {
    let text = message.to_lowercase();
    if mentions_any(&text, &["service", "services", "find", "search", "looking for"]) {
        let service_type = if text.contains("laundry") {
            Some("laundry")
        } else if mentions_any(&text, &["food", "restaurant"]) {
            Some("food")
        } else if text.contains("printing") {
            Some("printing")
        } else {
            None
        };
        return Detection { intent: Intent::ServiceSearch, service_type };
    }
    let intent = if mentions_any(&text, &["book", "booking", "appointment", "schedule"]) {
        Intent::Booking
    } else if mentions_any(&text, &["pay", "payment", "money", "cost", "price"]) {
        Intent::Payment
    } else if mentions_any(&text, &["order", "orders"]) {
        Intent::OrderStatus
    } else {
        Intent::General
    };
    Detection { intent, service_type: None }
}

pub fn general_reply<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    GENERAL_REPLIES.choose(rng).copied().unwrap_or(GENERAL_REPLIES[0])
}

fn random_general_reply() -> &'static str {
    general_reply(&mut rand::thread_rng())
}

/// Canned reply for every intent except a service search with a type.
pub fn canned_reply(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::ServiceSearch => None,
        Intent::Booking => Some(
            "I can help you with bookings! You can book appointments through our services page. What service would you like to book?",
        ),
        Intent::Payment => Some(
            "I can help you with payment questions! You can make payments using Mobile Money (MTN, Airtel, or Telecel). What payment information do you need?",
        ),
        Intent::OrderStatus => Some(
            "I can help you check your order status! You can view all your orders in the dashboard. Is there a specific order you'd like to know about?",
        ),
        Intent::General => None,
    }
}

/// Reply text for a service search given what the catalogue returned.
pub fn search_reply(service_type: Option<&str>, found: &[service::Model]) -> String {
    let Some(service_type) = service_type else {
        return "I can help you find services! What type of service are you looking for? For example, you can ask about laundry, food, printing, or other services.".to_string();
    };
    if found.is_empty() {
        return format!(
            "I couldn't find any {service_type} services available right now. Try browsing our services page to see what's available!"
        );
    }
    let lines: Vec<String> = found
        .iter()
        .map(|listing| match listing.base_price {
            Some(price) => format!("• {} - ₵{}", listing.service_name, two_places(price)),
            None => format!("• {} - price on request", listing.service_name),
        })
        .collect();
    format!(
        "I found some {service_type} services for you:\n\n{}\n\nWould you like to see more details about any of these services?",
        lines.join("\n")
    )
}

/// The assistant's answer to one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response: String,
    pub intent: Intent,
    pub entities: Value,
    pub confidence: f64,
    pub suggestions: Vec<&'static str>,
    pub tokens_used: i32,
}

pub fn count_words(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}

/// Answers `message`, searching the catalogue when the user asks for a
/// service type.
pub async fn compose_reply(db: &DatabaseConnection, message: &str) -> Result<Reply> {
    let detection = detect_intent(message);
    let response = match (detection.intent, detection.service_type) {
        (Intent::ServiceSearch, Some(service_type)) => {
            let found = service::Entity::find()
                .filter(service::Column::IsAvailable.eq(true))
                .filter(
                    Condition::any()
                        .add(service::Column::ServiceName.contains(service_type))
                        .add(service::Column::Category.eq(service_type)),
                )
                .order_by_asc(service::Column::Id)
                .limit(SEARCH_RESULT_LIMIT)
                .all(db)
                .await?;
            search_reply(Some(service_type), &found)
        }
        (Intent::ServiceSearch, None) => search_reply(None, &[]),
        (intent, _) => canned_reply(intent).unwrap_or_else(random_general_reply).to_string(),
    };
    Ok(Reply {
        tokens_used: count_words(message) + count_words(&response),
        entities: detection.entities(),
        suggestions: detection.intent.suggestions(),
        intent: detection.intent,
        confidence: REPLY_CONFIDENCE,
        response,
    })
}

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session_id: String,
    pub conversation: ai_conversation::Model,
    pub reply: Reply,
    pub response_time_ms: i64,
}

/// Runs a chat turn: resolves the conversation, stores both messages and logs
/// the interaction. Unknown session ids start a new conversation under that id.
#[instrument(skip(db, chatter, message, context), fields(user_id = chatter.id))]
pub async fn chat(
    db: &DatabaseConnection,
    chatter: &user::Model,
    session_id: Option<String>,
    message: &str,
    context: Value,
) -> Result<ChatTurn> {
    let started = Instant::now();
    let now = Utc::now();
    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let existing = ai_conversation::Entity::find()
        .filter(ai_conversation::Column::SessionId.eq(session_id.as_str()))
        .one(db)
        .await?;
    let conversation = match existing {
        Some(conversation) if conversation.user_id != chatter.id => {
            return Err(ComputeError::NotFound(format!("Conversation {session_id}")));
        }
        Some(conversation) => conversation,
        None => {
            debug!(session_id = %session_id, "starting conversation");
            ai_conversation::ActiveModel {
                user_id: Set(chatter.id),
                session_id: Set(session_id.clone()),
                title: Set(ai_conversation::title_from_message(message)),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    store_message(db, conversation.id, MessageType::User, message, context, 0, 0).await?;
    let reply = compose_reply(db, message).await?;
    let response_time_ms = started.elapsed().as_millis() as i64;

    let metadata = json!({
        "user_id": chatter.id,
        "user_type": chatter.user_type.to_value(),
        "timestamp": Utc::now().to_rfc3339(),
    });
    store_message(
        db,
        conversation.id,
        MessageType::Assistant,
        &reply.response,
        metadata,
        reply.tokens_used,
        response_time_ms,
    )
    .await?;

    ai_chatbot_log::ActiveModel {
        user_id: Set(Some(chatter.id)),
        session_id: Set(session_id.clone()),
        query: Set(message.to_string()),
        response: Set(reply.response.clone()),
        intent: Set(reply.intent.as_str().to_string()),
        entities: Set(reply.entities.clone()),
        confidence: Set(reply.confidence),
        response_time_ms: Set(response_time_ms),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut touched: ai_conversation::ActiveModel = conversation.into();
    touched.is_active = Set(true);
    touched.updated_at = Set(Utc::now());
    let conversation = touched.update(db).await?;

    info!(intent = reply.intent.as_str(), tokens = reply.tokens_used, "chat turn answered");
    Ok(ChatTurn { session_id, conversation, reply, response_time_ms })
}

async fn store_message(
    db: &DatabaseConnection,
    conversation_id: i32,
    message_type: MessageType,
    content: &str,
    metadata: Value,
    tokens_used: i32,
    response_time_ms: i64,
) -> Result<ai_message::Model> {
    Ok(ai_message::ActiveModel {
        conversation_id: Set(conversation_id),
        message_type: Set(message_type),
        content: Set(content.to_string()),
        metadata: Set(metadata),
        tokens_used: Set(tokens_used),
        response_time_ms: Set(response_time_ms),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn find_conversation(
    db: &DatabaseConnection,
    user_id: i32,
    session_id: &str,
) -> Result<ai_conversation::Model> {
    ai_conversation::Entity::find()
        .filter(ai_conversation::Column::SessionId.eq(session_id))
        .filter(ai_conversation::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound("Conversation".to_string()))
}

/// Deletes a conversation's messages and deactivates it.
#[instrument(skip(db))]
pub async fn clear_conversation(db: &DatabaseConnection, user_id: i32, session_id: &str) -> Result<u64> {
    let conversation = find_conversation(db, user_id, session_id).await?;
    let deleted = ai_message::Entity::delete_many()
        .filter(ai_message::Column::ConversationId.eq(conversation.id))
        .exec(db)
        .await?;
    let mut active: ai_conversation::ActiveModel = conversation.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(deleted.rows_affected)
}

/// Word-list sentiment of a text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub score: f64,
    pub label: &'static str,
    pub confidence: f64,
}

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let text = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|word| text.contains(*word)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|word| text.contains(*word)).count();
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment { score: 0.7, label: "positive", confidence: 0.8 },
        std::cmp::Ordering::Less => Sentiment { score: -0.7, label: "negative", confidence: 0.8 },
        std::cmp::Ordering::Equal => Sentiment { score: 0.0, label: "neutral", confidence: 0.6 },
    }
}

/// Unique lowercase words longer than three characters that are not stop
/// words, in order of first appearance.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(word))
        .filter(|word| seen.insert(word.to_string()))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Analyses `text` and stores the result.
#[instrument(skip(db, text))]
pub async fn record_sentiment(
    db: &DatabaseConnection,
    user_id: Option<i32>,
    text: &str,
) -> Result<ai_sentiment_analysis::Model> {
    let sentiment = analyze_sentiment(text);
    Ok(ai_sentiment_analysis::ActiveModel {
        user_id: Set(user_id),
        text: Set(text.to_string()),
        sentiment_score: Set(sentiment.score),
        sentiment_label: Set(sentiment.label.to_string()),
        confidence: Set(sentiment.confidence),
        keywords: Set(json!(extract_keywords(text))),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Confidence for recommending a service of `service_type` with `rating`.
pub fn recommendation_confidence(type_match: bool, rating: Option<Decimal>) -> f64 {
    let mut confidence = 0.5;
    if type_match {
        confidence += 0.3;
    }
    if rating.is_some_and(|rating| rating > Decimal::new(40, 1)) {
        confidence += 0.2;
    }
    f64::min(confidence, 1.0)
}

/// Suggests up to five available services the user has not ordered from,
/// updating any recommendation already stored for the same service.
#[instrument(skip(db))]
pub async fn generate_recommendations(
    db: &DatabaseConnection,
    user_id: i32,
    now: DateTime<Utc>,
) -> Result<Vec<ai_service_recommendation::Model>> {
    let ordered_services: Vec<i32> = order::Entity::find()
        .select_only()
        .column(order::Column::ServiceId)
        .filter(order::Column::CustomerId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;
    let bookings_count = booking::Entity::find()
        .filter(booking::Column::StudentId.eq(user_id))
        .count(db)
        .await?;

    let preferred_types: HashSet<String> = if ordered_services.is_empty() {
        HashSet::new()
    } else {
        service::Entity::find()
            .select_only()
            .column(service::Column::ServiceType)
            .filter(service::Column::Id.is_in(ordered_services.iter().copied()))
            .into_tuple::<ServiceType>()
            .all(db)
            .await?
            .into_iter()
            .map(|service_type| service_type.to_value())
            .collect()
    };

    let mut candidates = service::Entity::find().filter(service::Column::IsAvailable.eq(true));
    if !ordered_services.is_empty() {
        candidates = candidates.filter(service::Column::Id.is_not_in(ordered_services.iter().copied()));
    }
    let candidates = candidates
        .order_by_asc(service::Column::Id)
        .limit(RECOMMENDATION_CANDIDATES)
        .all(db)
        .await?;

    let mut stored = Vec::with_capacity(candidates.len());
    for listing in candidates {
        let type_match = preferred_types.contains(&listing.service_type.to_value());
        let confidence = recommendation_confidence(type_match, listing.rating);
        let context = json!({
            "user_orders_count": ordered_services.len(),
            "user_bookings_count": bookings_count,
            "service_rating": listing.rating.and_then(|rating| rating.to_f64()).unwrap_or(0.0),
            "service_type_match": type_match,
        });
        let reason = "Based on your preferences and service popularity".to_string();

        let existing = ai_service_recommendation::Entity::find()
            .filter(ai_service_recommendation::Column::UserId.eq(user_id))
            .filter(ai_service_recommendation::Column::ServiceId.eq(listing.id))
            .one(db)
            .await?;
        let saved = match existing {
            Some(existing) => {
                let mut active: ai_service_recommendation::ActiveModel = existing.into();
                active.confidence_score = Set(confidence);
                active.reason = Set(reason);
                active.context = Set(context);
                active.update(db).await?
            }
            None => {
                ai_service_recommendation::ActiveModel {
                    user_id: Set(user_id),
                    service_id: Set(listing.id),
                    confidence_score: Set(confidence),
                    reason: Set(reason),
                    context: Set(context),
                    is_viewed: Set(false),
                    is_clicked: Set(false),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };
        stored.push(saved);
    }
    info!(user_id, count = stored.len(), "recommendations generated");
    Ok(stored)
}

/// Unviewed recommendations, most confident first.
pub async fn pending_recommendations(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<(ai_service_recommendation::Model, Option<service::Model>)>> {
    Ok(ai_service_recommendation::Entity::find()
        .filter(ai_service_recommendation::Column::UserId.eq(user_id))
        .filter(ai_service_recommendation::Column::IsViewed.eq(false))
        .order_by_desc(ai_service_recommendation::Column::ConfidenceScore)
        .limit(10)
        .find_also_related(service::Entity)
        .all(db)
        .await?)
}

/// Marks one of the user's recommendations viewed or clicked.
pub async fn mark_recommendation(
    db: &DatabaseConnection,
    user_id: i32,
    recommendation_id: i32,
    clicked: bool,
) -> Result<ai_service_recommendation::Model> {
    let recommendation = ai_service_recommendation::Entity::find_by_id(recommendation_id)
        .filter(ai_service_recommendation::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound("Recommendation".to_string()))?;
    let mut active: ai_service_recommendation::ActiveModel = recommendation.into();
    if clicked {
        active.is_clicked = Set(true);
    } else {
        active.is_viewed = Set(true);
    }
    Ok(active.update(db).await?)
}

/// Usage totals across every user.
#[instrument(skip(db))]
pub async fn assistant_analytics(db: &DatabaseConnection) -> Result<AssistantAnalytics> {
    let total_conversations = ai_conversation::Entity::find().count(db).await?;
    let total_messages = ai_message::Entity::find().count(db).await?;

    let response_times: Vec<i64> = ai_message::Entity::find()
        .select_only()
        .column(ai_message::Column::ResponseTimeMs)
        .filter(ai_message::Column::MessageType.eq(MessageType::Assistant))
        .into_tuple()
        .all(db)
        .await?;
    let average_response_time_ms = if response_times.is_empty() {
        0.0
    } else {
        let mean = response_times.iter().sum::<i64>() as f64 / response_times.len() as f64;
        (mean * 100.0).round() / 100.0
    };

    let intents: Vec<String> = ai_chatbot_log::Entity::find()
        .select_only()
        .column(ai_chatbot_log::Column::Intent)
        .into_tuple()
        .all(db)
        .await?;
    let labels: Vec<String> = ai_sentiment_analysis::Entity::find()
        .select_only()
        .column(ai_sentiment_analysis::Column::SentimentLabel)
        .into_tuple()
        .all(db)
        .await?;

    let mut intent_distribution = BTreeMap::new();
    for intent in intents {
        *intent_distribution.entry(intent).or_insert(0) += 1;
    }
    let mut sentiment_distribution = BTreeMap::new();
    for label in labels {
        *sentiment_distribution.entry(label).or_insert(0) += 1;
    }

    Ok(AssistantAnalytics {
        total_conversations,
        total_messages,
        average_response_time_ms,
        intent_distribution,
        sentiment_distribution,
    })
}

/// Messages of a conversation, oldest first.
pub async fn conversation_messages(
    db: &DatabaseConnection,
    conversation: &ai_conversation::Model,
) -> Result<Vec<ai_message::Model>> {
    Ok(conversation
        .find_related(ai_message::Entity)
        .order_by_asc(ai_message::Column::CreatedAt)
        .order_by_asc(ai_message::Column::Id)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_order, create_service, create_user, setup_db};
    use model::entities::order::OrderStatus;
    use model::entities::service::ServiceCategory;
    use model::entities::user::UserType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn intents_are_checked_in_priority_order() {
        let search = detect_intent("Looking for a LAUNDRY place");
        assert_eq!(search.intent, Intent::ServiceSearch);
        assert_eq!(search.service_type, Some("laundry"));
        assert_eq!(detect_intent("find me a restaurant").service_type, Some("food"));
        assert_eq!(detect_intent("search").service_type, None);

        assert_eq!(detect_intent("I want to book a haircut").intent, Intent::Booking);
        assert_eq!(detect_intent("what does it cost").intent, Intent::Payment);
        assert_eq!(detect_intent("where is my order").intent, Intent::OrderStatus);
        assert_eq!(detect_intent("hello there").intent, Intent::General);
        // "book" wins over "pay" because bookings are checked first.
        assert_eq!(detect_intent("book and pay").intent, Intent::Booking);
    }

    #[test]
    fn general_replies_come_from_the_canned_set() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            assert!(GENERAL_REPLIES.contains(&general_reply(&mut rng)));
        }
        assert_eq!(Intent::General.suggestions().len(), 4);
        assert_eq!(Intent::Booking.suggestions()[2], "Cancel a booking");
    }

    #[test]
    fn sentiment_counts_word_hits() {
        assert_eq!(analyze_sentiment("Great food, I love it").label, "positive");
        assert_eq!(analyze_sentiment("terrible and awful, but good").score, -0.7);
        let neutral = analyze_sentiment("it arrived");
        assert_eq!((neutral.label, neutral.confidence), ("neutral", 0.6));
    }

    #[test]
    fn keywords_skip_short_and_stop_words() {
        let keywords = extract_keywords("The laundry service was fast and the laundry smelled fresh");
        assert_eq!(keywords, vec!["laundry", "service", "fast", "smelled", "fresh"]);
        let many = (0..20).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract_keywords(&many).len(), 10);
    }

    #[test]
    fn confidence_caps_at_one() {
        assert_eq!(recommendation_confidence(false, None), 0.5);
        assert_eq!(recommendation_confidence(true, Some(Decimal::new(400, 2))), 0.8);
        assert_eq!(recommendation_confidence(true, Some(Decimal::new(450, 2))), 1.0);
    }

    #[tokio::test]
    async fn service_search_lists_matching_services() {
        let db = setup_db().await;
        let vendor = create_user(&db, "vendor", UserType::Vendor).await;
        create_service(&db, vendor.id, "Quick Laundry", ServiceCategory::Laundry, ServiceType::Ordering, None).await;

        let reply = compose_reply(&db, "any laundry services?").await.unwrap();
        assert_eq!(reply.intent, Intent::ServiceSearch);
        assert!(reply.response.starts_with("I found some laundry services for you:"));
        assert!(reply.response.contains("• Quick Laundry - ₵15.00"));
        assert_eq!(reply.entities, json!({ "service_type": "laundry" }));

        let none = compose_reply(&db, "find printing services").await.unwrap();
        assert!(none.response.starts_with("I couldn't find any printing services"));
        assert_eq!(none.tokens_used, count_words("find printing services") + count_words(&none.response));
    }

    #[tokio::test]
    async fn chat_reuses_sessions_and_clears_them() {
        let db = setup_db().await;
        let student = create_user(&db, "ama", UserType::Student).await;

        let first = chat(&db, &student, None, "I want to book a tutor for tomorrow afternoon please", json!({}))
            .await
            .unwrap();
        assert_eq!(first.conversation.title.chars().count(), 50);
        let second = chat(&db, &student, Some(first.session_id.clone()), "how do I pay", json!({}))
            .await
            .unwrap();
        assert_eq!(second.conversation.id, first.conversation.id);
        assert_eq!(second.reply.intent, Intent::Payment);

        let messages = conversation_messages(&db, &second.conversation).await.unwrap();
        assert_eq!(messages.len(), 4);

        assert_eq!(clear_conversation(&db, student.id, &first.session_id).await.unwrap(), 4);
        let cleared = find_conversation(&db, student.id, &first.session_id).await.unwrap();
        assert!(!cleared.is_active);

        let analytics = assistant_analytics(&db).await.unwrap();
        assert_eq!(analytics.total_conversations, 1);
        assert_eq!(analytics.intent_distribution.get("booking"), Some(&1));
    }

    #[tokio::test]
    async fn recommendations_skip_ordered_services_and_upsert() {
        let db = setup_db().await;
        let vendor = create_user(&db, "vendor", UserType::Vendor).await;
        let student = create_user(&db, "kojo", UserType::Student).await;
        let ordered = create_service(&db, vendor.id, "Jollof", ServiceCategory::Food, ServiceType::Ordering, None).await;
        let fresh = create_service(&db, vendor.id, "Waakye", ServiceCategory::Food, ServiceType::Ordering, None).await;
        let other = create_service(&db, vendor.id, "Barber", ServiceCategory::Beauty, ServiceType::Booking, None).await;
        create_order(&db, ordered.id, student.id, Decimal::new(2000, 2), OrderStatus::Completed, Utc::now()).await;

        let recommendations = generate_recommendations(&db, student.id, Utc::now()).await.unwrap();
        let ids: Vec<i32> = recommendations.iter().map(|r| r.service_id).collect();
        assert_eq!(ids, vec![fresh.id, other.id]);
        assert_eq!(recommendations[0].confidence_score, 0.8);
        assert_eq!(recommendations[1].confidence_score, 0.5);
        assert_eq!(recommendations[0].context["service_type_match"], json!(true));

        let again = generate_recommendations(&db, student.id, Utc::now()).await.unwrap();
        assert_eq!(again[0].id, recommendations[0].id);
        assert_eq!(ai_service_recommendation::Entity::find().count(&db).await.unwrap(), 2);

        let clicked = mark_recommendation(&db, student.id, again[0].id, true).await.unwrap();
        assert!(clicked.is_clicked);
        assert_eq!(pending_recommendations(&db, student.id).await.unwrap().len(), 2);
    }
}
