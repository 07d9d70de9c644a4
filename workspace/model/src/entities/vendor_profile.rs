use sea_orm::entity::prelude::*;

/// How a vendor prefers to be paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PreferredPaymentMethod {
    #[sea_orm(string_value = "mtn_momo")]
    MtnMomo,
    #[sea_orm(string_value = "vodafone_cash")]
    VodafoneCash,
    #[sea_orm(string_value = "airtel_money")]
    AirtelMoney,
    #[sea_orm(string_value = "telecel_cash")]
    TelecelCash,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "cash")]
    Cash,
}

/// Business details of a vendor account. Exactly one per vendor user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vendor_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    pub business_name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub business_hours: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub mtn_momo_number: Option<String>,
    pub vodafone_cash_number: Option<String>,
    pub airtel_money_number: Option<String>,
    pub telecel_cash_number: Option<String>,
    pub preferred_payment_method: PreferredPaymentMethod,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Mobile-money numbers the vendor has registered, keyed by wallet.
    pub fn mobile_money_numbers(&self) -> Vec<(&'static str, String)> {
        [
            ("mtn_momo", &self.mtn_momo_number),
            ("vodafone_cash", &self.vodafone_cash_number),
            ("airtel_money", &self.airtel_money_number),
            ("telecel_cash", &self.telecel_cash_number),
        ]
        .into_iter()
        .filter_map(|(wallet, number)| number.clone().map(|n| (wallet, n)))
        .collect()
    }
}
