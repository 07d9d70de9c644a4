use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;

/// A student's rating of a service. One per (service, user).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub service_id: i32,
    pub user_id: i32,
    /// 1 to 5 stars.
    pub rating: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id",
        on_delete = "Cascade"
    )]
    Service,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub fn is_valid_rating(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// Mean of the ratings rounded half-up to two places; `None` for no ratings.
pub fn average_rating(ratings: &[i32]) -> Option<Decimal> {
    if ratings.is_empty() {
        return None;
    }
    let total: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let average = Decimal::from(total) / Decimal::from(ratings.len() as i64);
    let mut average = average.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    average.rescale(2);
    Some(average)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_round_to_two_places() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[5]), Some(Decimal::new(500, 2)));
        assert_eq!(average_rating(&[4]).map(|r| r.to_string()), Some("4.00".to_string()));
        assert_eq!(average_rating(&[5, 4, 4]), Some(Decimal::new(433, 2)));
        assert_eq!(average_rating(&[1, 2]), Some(Decimal::new(150, 2)));
    }

    #[test]
    fn ratings_are_one_to_five() {
        assert!(!is_valid_rating(0));
        assert!(is_valid_rating(1));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(6));
    }
}
