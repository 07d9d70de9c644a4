use sea_orm::entity::prelude::*;

use super::service::ServiceCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ApplicationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// A student's request to become a vendor. One per applicant; reviewed by an admin.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vendor_applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub applicant_id: i32,
    pub business_name: String,
    #[sea_orm(column_type = "Text")]
    pub business_description: String,
    pub category: ServiceCategory,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub experience: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub status: ApplicationStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub reviewed_by: Option<i32>,
    pub submitted_at: DateTimeUtc,
    pub reviewed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ApplicantId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Applicant,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewedBy",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Reviewer,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }
}

/// Field-level problems with an application's free-text fields.
pub fn validate_application_text(
    business_name: &str,
    business_description: &str,
    address: &str,
) -> Vec<(&'static str, &'static str)> {
    let mut problems = Vec::new();
    if business_name.trim().chars().count() < 3 {
        problems.push(("business_name", "Business name must be at least 3 characters long."));
    }
    if business_description.trim().chars().count() < 10 {
        problems.push((
            "business_description",
            "Business description must be at least 10 characters long.",
        ));
    }
    if address.trim().chars().count() < 5 {
        problems.push(("address", "Address must be at least 5 characters long."));
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_fields_are_reported() {
        let problems = validate_application_text("ab", "too short", "x");
        let fields: Vec<&str> = problems.iter().map(|(field, _)| *field).collect();
        assert_eq!(fields, vec!["business_name", "business_description", "address"]);
        assert!(validate_application_text("Mama Put", "Hot jollof every day", "Hostel A").is_empty());
    }
}
