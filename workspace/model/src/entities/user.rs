use sea_orm::entity::prelude::*;

/// Role of an account on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum UserType {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "vendor")]
    Vendor,
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// A person using the platform: a student buying services, a vendor selling
/// them, or an admin moderating the marketplace.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    /// Digits only, at least ten of them.
    #[sea_orm(unique)]
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
    pub user_type: UserType,
    /// Argon2 PHC string.
    pub password_hash: String,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub date_joined: DateTimeUtc,
    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::vendor_profile::Entity")]
    VendorProfile,
    #[sea_orm(has_many = "super::service::Entity")]
    Service,
    #[sea_orm(has_many = "super::booking::Entity")]
    Booking,
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
    #[sea_orm(has_many = "super::notification::Entity")]
    Notification,
    #[sea_orm(has_many = "super::blacklisted_token::Entity")]
    BlacklistedToken,
}

impl Related<super::vendor_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VendorProfile.def()
    }
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_student(&self) -> bool {
        self.user_type == UserType::Student
    }

    pub fn is_vendor(&self) -> bool {
        self.user_type == UserType::Vendor
    }

    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    /// "First Last", falling back to the username when no names are stored.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Keeps only the digits of a phone number; `None` when fewer than ten remain.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 10 { Some(digits) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_keep_digits_only() {
        assert_eq!(normalize_phone_number("+233 24-123-4567"), Some("233241234567".to_string()));
        assert_eq!(normalize_phone_number("024 123"), None);
    }
}
