use std::collections::HashMap;

use sea_orm::entity::prelude::*;

use super::notification::{NotificationType, Priority};

/// Reusable title/message pair with `{name}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub notification_type: NotificationType,
    pub title_template: String,
    #[sea_orm(column_type = "Text")]
    pub message_template: String,
    pub default_priority: Priority,
    pub default_send_email: bool,
    pub default_send_push: bool,
    pub default_send_sms: bool,
    pub default_expiry_hours: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Replaces every `{name}` with its value. Fails with the first placeholder
/// that has no value. `{{` and `}}` produce literal braces.
pub fn render(template: &str, variables: &HashMap<String, String>) -> Result<String, String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    output.push('{');
                    output.push_str(&name);
                    continue;
                }
                match variables.get(name.trim()) {
                    Some(value) => output.push_str(value),
                    None => return Err(name.trim().to_string()),
                }
            }
            other => output.push(other),
        }
    }
    Ok(output)
}

impl Model {
    /// Renders (title, message) with the given variables.
    pub fn render(&self, variables: &HashMap<String, String>) -> Result<(String, String), String> {
        Ok((render(&self.title_template, variables)?, render(&self.message_template, variables)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (String::from(*k), String::from(*v))).collect()
    }

    #[test]
    fn placeholders_are_substituted() {
        let rendered = render("Order #{order_id} from {service}", &vars(&[("order_id", "42"), ("service", "Jollof Hub")]));
        assert_eq!(rendered.unwrap(), "Order #42 from Jollof Hub");
    }

    #[test]
    fn missing_variables_are_reported() {
        assert_eq!(render("Hi {name}", &vars(&[])), Err("name".to_string()));
    }

    #[test]
    fn doubled_braces_are_literal() {
        assert_eq!(render("{{not}} a {x}", &vars(&[("x", "var")])).unwrap(), "{not} a var");
    }
}
