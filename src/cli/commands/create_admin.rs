use anyhow::{bail, Result};
use chrono::Utc;
use model::entities::user::{self, UserType};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, Database, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tracing::info;

use crate::auth::hash_password;

pub async fn create_admin(database_url: &str, username: &str, email: &str, password: &str) -> Result<()> {
    if password.len() < 8 {
        bail!("password must be at least 8 characters");
    }
    let db = Database::connect(database_url).await?;

    let taken = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(username))
                .add(user::Column::Email.eq(email)),
        )
        .count(&db)
        .await?;
    if taken > 0 {
        bail!("a user with this username or email already exists");
    }

    let admin = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        user_type: Set(UserType::Admin),
        password_hash: Set(hash_password(password)?),
        is_active: Set(true),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    info!("Admin '{}' created with id {}", admin.username, admin.id);
    Ok(())
}
