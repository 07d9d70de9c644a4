pub mod create_admin;
pub mod import_templates;
pub mod initdb;
pub mod migrate_and_serve;
pub mod serve;

pub use create_admin::create_admin;
pub use import_templates::import_templates;
pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;
