pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_catalogue;
mod m20250101_000003_create_transactions;
mod m20250101_000004_create_notifications;
mod m20250101_000005_create_complaints;
mod m20250101_000006_create_assistant;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_catalogue::Migration),
            Box::new(m20250101_000003_create_transactions::Migration),
            Box::new(m20250101_000004_create_notifications::Migration),
            Box::new(m20250101_000005_create_complaints::Migration),
            Box::new(m20250101_000006_create_assistant::Migration),
        ]
    }
}
