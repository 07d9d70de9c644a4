use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reporting window accepted by the analytics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    #[default]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl TimeRange {
    pub fn days(&self) -> i64 {
        match self {
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Quarter => 90,
            TimeRange::Year => 365,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.days())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
            TimeRange::Year => "1y",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            "90d" => Ok(TimeRange::Quarter),
            "1y" => Ok(TimeRange::Year),
            other => Err(format!("Unknown time range '{other}'. Use one of 7d, 30d, 90d, 1y.")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserCounts {
    pub total: u64,
    pub students: u64,
    pub vendors: u64,
    pub admins: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceCounts {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
}

/// A total plus a breakdown by status value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusCounts {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

impl StatusCounts {
    pub fn from_statuses<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts = StatusCounts::default();
        for status in statuses {
            counts.total += 1;
            *counts.by_status.entry(status.into()).or_insert(0) += 1;
        }
        counts
    }

    pub fn count(&self, status: &str) -> u64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentCounts {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Sum of successful payment amounts.
    pub successful_revenue: Decimal,
}

/// Platform-wide counters for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminDashboard {
    pub users: UserCounts,
    pub services: ServiceCounts,
    pub orders: StatusCounts,
    pub bookings: StatusCounts,
    pub payments: PaymentCounts,
    pub reviews: u64,
    pub vendor_applications: StatusCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RevenueMetrics {
    pub total: Decimal,
    pub monthly: Decimal,
    pub weekly: Decimal,
    pub daily: Decimal,
    /// Percent change against the previous window of the same length.
    pub growth: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderMetrics {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub cancelled: u64,
    pub growth: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomerMetrics {
    pub total: u64,
    pub new: u64,
    pub returning: u64,
    pub growth: f64,
}

/// One cell of the weekday by hour demand grid. `day` 0 is Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DemandCell {
    pub day: u8,
    pub hour: u8,
    pub demand: f64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PopularService {
    pub service_id: i32,
    pub service_name: String,
    pub revenue: Decimal,
    pub orders: u64,
    pub average_rating: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationInsight {
    pub location: String,
    pub orders: u64,
    pub revenue: Decimal,
    pub average_rating: f64,
}

/// Everything the vendor dashboard charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VendorAnalytics {
    pub vendor_id: i32,
    pub time_range: TimeRange,
    pub revenue: RevenueMetrics,
    pub orders: OrderMetrics,
    pub customers: CustomerMetrics,
    pub demand_heatmap: Vec<DemandCell>,
    pub popular_services: Vec<PopularService>,
    pub location_insights: Vec<LocationInsight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceAnalytics {
    pub service_id: i32,
    pub service_name: String,
    pub time_range: TimeRange,
    pub revenue: Decimal,
    pub orders: u64,
    pub average_rating: Option<Decimal>,
    pub rating_count: u64,
}

/// Usage counters for the chat assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssistantAnalytics {
    pub total_conversations: u64,
    pub total_messages: u64,
    pub average_response_time_ms: f64,
    pub intent_distribution: BTreeMap<String, u64>,
    pub sentiment_distribution: BTreeMap<String, u64>,
}

/// Per-day, per-type delivery counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyNotificationStats {
    pub date: chrono::NaiveDate,
    pub notification_type: String,
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_read: u64,
    pub delivery_rate: f64,
    pub read_rate: f64,
    pub email_sent: u64,
    pub push_sent: u64,
    pub sms_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ranges_parse_their_wire_names() {
        assert_eq!("7d".parse::<TimeRange>(), Ok(TimeRange::Week));
        assert_eq!("1y".parse::<TimeRange>().map(|r| r.days()), Ok(365));
        assert!("2w".parse::<TimeRange>().is_err());
        assert_eq!(serde_json::to_string(&TimeRange::Quarter).unwrap(), "\"90d\"");
        assert_eq!(TimeRange::default(), TimeRange::Month);
    }

    #[test]
    fn status_counts_tally_each_value() {
        let counts = StatusCounts::from_statuses(["pending", "completed", "pending"]);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.count("pending"), 2);
        assert_eq!(counts.count("cancelled"), 0);
    }
}
