use std::fs;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use model::entities::notification::{NotificationType, Priority};
use model::entities::notification_template;
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::handlers::notifications::CreateTemplateRequest;
use crate::helpers::converters::{parse_enum, parse_optional_enum};

/// Upserts notification templates by name from a YAML list.
///
/// ```yaml
/// - name: order_ready
///   notification_type: order_update
///   title_template: "Order #{order_id} is ready"
///   message_template: "Pick up your order from {service}."
///   default_priority: high
/// ```
pub async fn import_templates(file: &str, database_url: &str) -> Result<()> {
    info!("Importing notification templates from {}", file);
    let raw = fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
    let templates: Vec<CreateTemplateRequest> =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {file}"))?;
    debug!("Parsed {} templates", templates.len());

    for template in &templates {
        if let Err(errors) = template.validate() {
            bail!("template '{}' is invalid: {}", template.name, errors);
        }
    }

    let db = Database::connect(database_url).await?;
    let (mut created, mut updated) = (0, 0);
    let now = Utc::now();

    for template in templates {
        let notification_type: NotificationType = parse_enum("notification_type", &template.notification_type)
            .with_context(|| format!("template '{}'", template.name))?;
        let priority = parse_optional_enum::<Priority>("default_priority", template.default_priority.as_deref())
            .with_context(|| format!("template '{}'", template.name))?
            .unwrap_or(Priority::Medium);

        let existing = notification_template::Entity::find()
            .filter(notification_template::Column::Name.eq(template.name.as_str()))
            .one(&db)
            .await?;

        let mut row = match &existing {
            Some(found) => notification_template::ActiveModel::from(found.clone()),
            None => notification_template::ActiveModel {
                name: Set(template.name.clone()),
                created_at: Set(now),
                ..Default::default()
            },
        };
        row.notification_type = Set(notification_type);
        row.title_template = Set(template.title_template);
        row.message_template = Set(template.message_template);
        row.default_priority = Set(priority);
        row.default_send_email = Set(template.default_send_email);
        row.default_send_push = Set(template.default_send_push.unwrap_or(true));
        row.default_send_sms = Set(template.default_send_sms);
        row.default_expiry_hours = Set(template.default_expiry_hours.unwrap_or(24));
        row.is_active = Set(template.is_active.unwrap_or(true));
        row.updated_at = Set(now);

        if existing.is_some() {
            row.update(&db).await?;
            updated += 1;
        } else {
            row.insert(&db).await?;
            created += 1;
        }
    }

    if created + updated == 0 {
        warn!("No templates found in {}", file);
    }
    info!("Templates imported: {} created, {} updated", created, updated);
    Ok(())
}
