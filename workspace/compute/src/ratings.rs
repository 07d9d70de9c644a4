use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set};
use tracing::{debug, instrument};

use model::entities::{review, service};

use crate::error::{ComputeError, Result};

/// Recomputes a service's average rating and rating count from its reviews.
/// Called after every review insert, update and delete.
#[instrument(skip(db))]
pub async fn recompute_service_rating<C: ConnectionTrait>(db: &C, service_id: i32) -> Result<service::Model> {
    let listing = service::Entity::find_by_id(service_id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("Service {service_id}")))?;

    let ratings: Vec<i32> = review::Entity::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::ServiceId.eq(service_id))
        .into_tuple()
        .all(db)
        .await?;
    let average = review::average_rating(&ratings);
    debug!(service_id, count = ratings.len(), ?average, "service rating recomputed");

    let mut active: service::ActiveModel = listing.into();
    active.rating = Set(average);
    active.total_ratings = Set(ratings.len() as i32);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_review, create_service, create_user, setup_db};
    use model::entities::service::{ServiceCategory, ServiceType};
    use model::entities::user::UserType;
    use rust_decimal::Decimal;
    use sea_orm::ModelTrait;

    #[tokio::test]
    async fn rating_follows_reviews() {
        let db = setup_db().await;
        let vendor = create_user(&db, "vendor", UserType::Vendor).await;
        let listing = create_service(&db, vendor.id, "Wash Hub", ServiceCategory::Laundry, ServiceType::Ordering, None).await;
        let ama = create_user(&db, "ama", UserType::Student).await;
        let kojo = create_user(&db, "kojo", UserType::Student).await;

        create_review(&db, listing.id, ama.id, 5).await;
        let second = create_review(&db, listing.id, kojo.id, 4).await;
        let updated = recompute_service_rating(&db, listing.id).await.unwrap();
        assert_eq!(updated.rating, Some(Decimal::new(450, 2)));
        assert_eq!(updated.total_ratings, 2);

        second.delete(&db).await.unwrap();
        let updated = recompute_service_rating(&db, listing.id).await.unwrap();
        assert_eq!(updated.rating, Some(Decimal::new(500, 2)));
        assert_eq!(updated.total_ratings, 1);
    }

    #[tokio::test]
    async fn no_reviews_clears_the_rating() {
        let db = setup_db().await;
        let vendor = create_user(&db, "vendor", UserType::Vendor).await;
        let listing = create_service(&db, vendor.id, "Print Pro", ServiceCategory::Printing, ServiceType::WalkIn, None).await;

        let updated = recompute_service_rating(&db, listing.id).await.unwrap();
        assert_eq!(updated.rating, None);
        assert_eq!(updated.total_ratings, 0);
        assert!(matches!(
            recompute_service_rating(&db, 999).await,
            Err(ComputeError::NotFound(_))
        ));
    }
}
