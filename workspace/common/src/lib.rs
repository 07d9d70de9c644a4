//! Transport types shared by the compute crate and the HTTP layer: analytics
//! reports and the envelopes pushed over WebSockets.

mod analytics;
mod realtime;

pub use analytics::{
    AdminDashboard, AssistantAnalytics, CustomerMetrics, DailyNotificationStats, DemandCell, LocationInsight, OrderMetrics,
    PaymentCounts, PopularService, RevenueMetrics, ServiceAnalytics, ServiceCounts, StatusCounts, TimeRange,
    UserCounts, VendorAnalytics,
};
pub use realtime::{NotificationPayload, RealtimeEvent};
