use sea_orm::{ActiveEnum, Iterable};

use crate::errors::AppError;

/// Parses the wire value of a status/category enum, reporting the allowed
/// choices under `field` on failure.
pub fn parse_enum<E>(field: &str, raw: &str) -> Result<E, AppError>
where
    E: ActiveEnum<Value = String> + Iterable,
{
    E::try_from_value(&raw.to_string()).map_err(|_| {
        let choices: Vec<String> = E::iter().map(|variant| variant.to_value()).collect();
        AppError::field(
            field,
            format!("'{raw}' is not a valid choice. Use one of: {}.", choices.join(", ")),
        )
    })
}

pub fn parse_optional_enum<E>(field: &str, raw: Option<&str>) -> Result<Option<E>, AppError>
where
    E: ActiveEnum<Value = String> + Iterable,
{
    raw.map(|value| parse_enum(field, value)).transpose()
}

/// Zero-based page index and page size from 1-based query values.
pub fn page_window(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> (u64, u64) {
    (page.unwrap_or(1).saturating_sub(1), limit.unwrap_or(default_limit).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::entities::booking::BookingStatus;
    use model::entities::service::ServiceCategory;

    #[test]
    fn known_values_parse() {
        let status: BookingStatus = parse_enum("status", "confirmed").unwrap();
        assert_eq!(status, BookingStatus::Confirmed);
        let category: Option<ServiceCategory> = parse_optional_enum("category", None).unwrap();
        assert_eq!(category, None);
    }

    #[test]
    fn unknown_values_list_the_choices() {
        match parse_enum::<BookingStatus>("status", "done") {
            Err(AppError::BadRequest { message, errors }) => {
                assert!(message.contains("pending, confirmed, cancelled, completed"));
                assert!(errors.unwrap().get("status").is_some());
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn pages_are_one_based() {
        assert_eq!(page_window(None, None, 20), (0, 20));
        assert_eq!(page_window(Some(3), Some(5), 20), (2, 5));
    }
}
