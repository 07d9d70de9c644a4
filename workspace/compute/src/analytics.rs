//! Aggregate reports for the admin and vendor dashboards.
//!
//! Counts are pulled with narrow `select_only` queries and folded in Rust;
//! the schema is small enough that grouping here keeps the queries portable
//! between SQLite and Postgres.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use tracing::{debug, instrument};

use common::{
    AdminDashboard, CustomerMetrics, DailyNotificationStats, DemandCell, LocationInsight, OrderMetrics,
    PaymentCounts, PopularService, RevenueMetrics, ServiceAnalytics, ServiceCounts, StatusCounts, TimeRange,
    UserCounts, VendorAnalytics,
};
use model::entities::booking::BookingStatus;
use model::entities::notification::{self, NotificationType};
use model::entities::order::OrderStatus;
use model::entities::payment::PaymentStatus;
use model::entities::service::ServiceCategory;
use model::entities::user::UserType;
use model::entities::vendor_application::ApplicationStatus;
use model::entities::{booking, order, payment, review, service, user, vendor_application};
use model::money::two_places;

use crate::error::Result;

const POPULAR_SERVICES_LIMIT: usize = 10;

/// Percent change from `previous` to `current`, two decimals; zero when there
/// is nothing to compare against.
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        round2((current - previous) / previous * 100.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Platform-wide counters.
#[instrument(skip(db))]
pub async fn admin_dashboard(db: &DatabaseConnection) -> Result<AdminDashboard> {
    let user_types: Vec<UserType> = user::Entity::find()
        .select_only()
        .column(user::Column::UserType)
        .into_tuple()
        .all(db)
        .await?;
    let mut users = UserCounts { total: user_types.len() as u64, ..Default::default() };
    for user_type in user_types {
        match user_type {
            UserType::Student => users.students += 1,
            UserType::Vendor => users.vendors += 1,
            UserType::Admin => users.admins += 1,
        }
    }

    let categories: Vec<ServiceCategory> = service::Entity::find()
        .select_only()
        .column(service::Column::Category)
        .into_tuple()
        .all(db)
        .await?;
    let mut services = ServiceCounts { total: categories.len() as u64, ..Default::default() };
    for category in categories {
        *services.by_category.entry(category.to_value()).or_insert(0) += 1;
    }

    let order_statuses: Vec<OrderStatus> = order::Entity::find()
        .select_only()
        .column(order::Column::OrderStatus)
        .into_tuple()
        .all(db)
        .await?;
    let booking_statuses: Vec<BookingStatus> = booking::Entity::find()
        .select_only()
        .column(booking::Column::BookingStatus)
        .into_tuple()
        .all(db)
        .await?;
    let application_statuses: Vec<ApplicationStatus> = vendor_application::Entity::find()
        .select_only()
        .column(vendor_application::Column::Status)
        .into_tuple()
        .all(db)
        .await?;

    let payment_rows: Vec<(PaymentStatus, Decimal)> = payment::Entity::find()
        .select_only()
        .column(payment::Column::Status)
        .column(payment::Column::Amount)
        .into_tuple()
        .all(db)
        .await?;
    let statuses = StatusCounts::from_statuses(payment_rows.iter().map(|(status, _)| status.to_value()));
    let successful_revenue: Decimal = payment_rows
        .iter()
        .filter(|(status, _)| *status == PaymentStatus::Successful)
        .map(|(_, amount)| *amount)
        .sum::<Decimal>();
    let successful_revenue = two_places(successful_revenue);

    let reviews = review::Entity::find().count(db).await?;

    Ok(AdminDashboard {
        users,
        services,
        orders: StatusCounts::from_statuses(order_statuses.into_iter().map(|s| s.to_value())),
        bookings: StatusCounts::from_statuses(booking_statuses.into_iter().map(|s| s.to_value())),
        payments: PaymentCounts { total: statuses.total, by_status: statuses.by_status, successful_revenue },
        reviews,
        vendor_applications: StatusCounts::from_statuses(application_statuses.into_iter().map(|s| s.to_value())),
    })
}

/// Orders placed on any of `service_ids` in `[from, to)`.
async fn orders_between(
    db: &DatabaseConnection,
    service_ids: &[i32],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<order::Model>> {
    if service_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(order::Entity::find()
        .filter(order::Column::ServiceId.is_in(service_ids.iter().copied()))
        .filter(order::Column::CreatedAt.gte(from))
        .filter(order::Column::CreatedAt.lt(to))
        .all(db)
        .await?)
}

async fn ratings_for(db: &DatabaseConnection, service_id: i32) -> Result<Vec<i32>> {
    Ok(review::Entity::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::ServiceId.eq(service_id))
        .into_tuple()
        .all(db)
        .await?)
}

fn revenue_of(orders: &[order::Model]) -> Decimal {
    two_places(orders.iter().map(|o| o.total_amount).sum())
}

/// Revenue, order, customer and demand figures for one vendor's services
/// over `range` ending at `now`.
#[instrument(skip(db))]
pub async fn vendor_analytics(
    db: &DatabaseConnection,
    vendor_id: i32,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<VendorAnalytics> {
    let services = service::Entity::find()
        .filter(service::Column::VendorId.eq(vendor_id))
        .all(db)
        .await?;
    let service_ids: Vec<i32> = services.iter().map(|s| s.id).collect();

    let start = now - range.duration();
    let previous_start = start - range.duration();
    let current = orders_between(db, &service_ids, start, now).await?;
    let previous = orders_between(db, &service_ids, previous_start, start).await?;
    debug!(vendor_id, current = current.len(), previous = previous.len(), "orders loaded");

    let total = revenue_of(&current);
    let days = Decimal::from(range.days());
    let revenue = RevenueMetrics {
        total,
        monthly: two_places(total * Decimal::from(30) / days),
        weekly: two_places(total * Decimal::from(7) / days),
        daily: two_places(total / days),
        growth: growth_rate(to_f64(total), to_f64(revenue_of(&previous))),
    };

    let completed = current.iter().filter(|o| o.order_status == OrderStatus::Completed).count() as u64;
    let cancelled = current.iter().filter(|o| o.order_status == OrderStatus::Cancelled).count() as u64;
    let orders = OrderMetrics {
        total: current.len() as u64,
        completed,
        cancelled,
        pending: current.len() as u64 - completed - cancelled,
        growth: growth_rate(current.len() as f64, previous.len() as f64),
    };

    let customers = customer_metrics(db, &service_ids, &current, &previous, start).await?;

    let mut popular_services = Vec::with_capacity(services.len());
    for listing in &services {
        let own: Vec<&order::Model> = current.iter().filter(|o| o.service_id == listing.id).collect();
        let ratings = ratings_for(db, listing.id).await?;
        popular_services.push(PopularService {
            service_id: listing.id,
            service_name: listing.service_name.clone(),
            revenue: two_places(own.iter().map(|o| o.total_amount).sum()),
            orders: own.len() as u64,
            average_rating: review::average_rating(&ratings),
        });
    }
    popular_services.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    popular_services.truncate(POPULAR_SERVICES_LIMIT);

    Ok(VendorAnalytics {
        vendor_id,
        time_range: range,
        revenue,
        orders,
        customers,
        demand_heatmap: demand_heatmap(total),
        popular_services,
        location_insights: location_insights(),
    })
}

async fn customer_metrics(
    db: &DatabaseConnection,
    service_ids: &[i32],
    current: &[order::Model],
    previous: &[order::Model],
    start: DateTime<Utc>,
) -> Result<CustomerMetrics> {
    let current_customers: HashSet<i32> = current.iter().map(|o| o.customer_id).collect();
    let previous_customers: HashSet<i32> = previous.iter().map(|o| o.customer_id).collect();

    let seen_before: HashSet<i32> = if service_ids.is_empty() || current_customers.is_empty() {
        HashSet::new()
    } else {
        order::Entity::find()
            .select_only()
            .column(order::Column::CustomerId)
            .filter(order::Column::ServiceId.is_in(service_ids.iter().copied()))
            .filter(order::Column::CustomerId.is_in(current_customers.iter().copied()))
            .filter(order::Column::CreatedAt.lt(start))
            .into_tuple::<i32>()
            .all(db)
            .await?
            .into_iter()
            .collect()
    };

    let total = current_customers.len() as u64;
    let returning = current_customers.intersection(&seen_before).count() as u64;
    Ok(CustomerMetrics {
        total,
        new: total - returning,
        returning,
        growth: growth_rate(total as f64, previous_customers.len() as f64),
    })
}

/// Revenue, order count and rating for one service over `range`.
#[instrument(skip(db, listing), fields(service_id = listing.id))]
pub async fn service_analytics(
    db: &DatabaseConnection,
    listing: &service::Model,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<ServiceAnalytics> {
    let orders = orders_between(db, &[listing.id], now - range.duration(), now).await?;
    let ratings = ratings_for(db, listing.id).await?;
    Ok(ServiceAnalytics {
        service_id: listing.id,
        service_name: listing.service_name.clone(),
        time_range: range,
        revenue: revenue_of(&orders),
        orders: orders.len() as u64,
        average_rating: review::average_rating(&ratings),
        rating_count: ratings.len() as u64,
    })
}

/// Modelled demand for each weekday and hour. Weekends (Friday to Sunday)
/// start higher and the lunch and dinner rushes double the base.
pub fn demand_heatmap(total_revenue: Decimal) -> Vec<DemandCell> {
    let mut cells = Vec::with_capacity(7 * 24);
    for day in 0..7u8 {
        let base = if day >= 4 { 0.3 } else { 0.1 };
        for hour in 0..24u8 {
            let rush = (12..=14).contains(&hour) || (18..=20).contains(&hour);
            let demand = if rush { base * 2.0 } else { base };
            let share = Decimal::from_f64(demand).unwrap_or_default();
            cells.push(DemandCell {
                day,
                hour,
                demand,
                revenue: two_places(total_revenue * share / Decimal::ONE_HUNDRED),
            });
        }
    }
    cells
}

/// Fixed per-hostel figures shown until orders carry a delivery location.
pub fn location_insights() -> Vec<LocationInsight> {
    [("Hostel A", 45, 120050, 4.2), ("Hostel B", 32, 89025, 4.0), ("Hostel C", 28, 75680, 3.8)]
        .into_iter()
        .map(|(location, orders, cents, average_rating)| LocationInsight {
            location: location.to_string(),
            orders,
            revenue: Decimal::new(cents, 2),
            average_rating,
        })
        .collect()
}

#[derive(Default)]
struct TypeTally {
    total: u64,
    delivered: u64,
    read: u64,
    email: u64,
    push: u64,
    sms: u64,
}

/// Per-type delivery statistics for notifications created on `date`.
#[instrument(skip(db))]
pub async fn notification_analytics(db: &DatabaseConnection, date: NaiveDate) -> Result<Vec<DailyNotificationStats>> {
    let Some(start) = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()) else {
        return Ok(Vec::new());
    };
    let end = start + chrono::Duration::days(1);
    let notes = notification::Entity::find()
        .filter(notification::Column::CreatedAt.gte(start))
        .filter(notification::Column::CreatedAt.lt(end))
        .all(db)
        .await?;

    let mut tallies: BTreeMap<String, TypeTally> = BTreeMap::new();
    for note in &notes {
        let tally = tallies.entry(note.notification_type.to_value()).or_default();
        tally.total += 1;
        tally.delivered += u64::from(note.is_delivered);
        tally.read += u64::from(note.is_read);
        tally.email += u64::from(note.send_email);
        tally.push += u64::from(note.send_push);
        tally.sms += u64::from(note.send_sms);
    }

    Ok(tallies
        .into_iter()
        .map(|(notification_type, t)| DailyNotificationStats {
            date,
            notification_type,
            total_sent: t.total,
            total_delivered: t.delivered,
            total_read: t.read,
            delivery_rate: percentage(t.delivered, t.total),
            read_rate: percentage(t.read, t.delivered),
            email_sent: t.email,
            push_sent: t.push,
            sms_sent: t.sms,
        })
        .collect())
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

/// Notification totals for the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationStats {
    pub total: u64,
    pub unread: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

#[instrument(skip(db))]
pub async fn notification_stats(db: &DatabaseConnection, user_id: i32) -> Result<NotificationStats> {
    let rows: Vec<(NotificationType, notification::Priority, bool)> = notification::Entity::find()
        .select_only()
        .column(notification::Column::NotificationType)
        .column(notification::Column::Priority)
        .column(notification::Column::IsRead)
        .filter(notification::Column::UserId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;
    let mut stats = NotificationStats { total: rows.len() as u64, ..Default::default() };
    for (notification_type, priority, is_read) in rows {
        stats.unread += u64::from(!is_read);
        *stats.by_type.entry(notification_type.to_value()).or_insert(0) += 1;
        *stats.by_priority.entry(priority.to_value()).or_insert(0) += 1;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{send_notification_at, NewNotification, NoopSink};
    use crate::testing::{create_order, create_review, create_service, create_user, setup_db};
    use chrono::{Duration, TimeZone};
    use model::entities::service::ServiceType;

    #[test]
    fn growth_is_zero_without_a_baseline() {
        assert_eq!(growth_rate(10.0, 0.0), 0.0);
        assert_eq!(growth_rate(150.0, 100.0), 50.0);
        assert_eq!(growth_rate(1.0, 3.0), -66.67);
    }

    #[test]
    fn heatmap_peaks_on_weekend_rush_hours() {
        let cells = demand_heatmap(Decimal::new(100000, 2));
        assert_eq!(cells.len(), 7 * 24);

        let monday_morning = &cells[9];
        assert_eq!((monday_morning.day, monday_morning.hour), (0, 9));
        assert_eq!(monday_morning.demand, 0.1);

        let saturday_dinner = cells.iter().find(|c| c.day == 5 && c.hour == 19).unwrap();
        assert_eq!(saturday_dinner.demand, 0.6);
        assert_eq!(saturday_dinner.revenue, Decimal::new(600, 2));
    }

    #[tokio::test]
    async fn vendor_report_compares_with_previous_window() {
        let db = setup_db().await;
        let now = Utc.with_ymd_and_hms(2025, 4, 30, 12, 0, 0).unwrap();
        let vendor = create_user(&db, "vendor", UserType::Vendor).await;
        let chop = create_service(&db, vendor.id, "Chop Bar", ServiceCategory::Food, ServiceType::Ordering, None).await;
        let print = create_service(&db, vendor.id, "Print", ServiceCategory::Printing, ServiceType::Ordering, None).await;
        let regular = create_user(&db, "regular", UserType::Student).await;
        let newcomer = create_user(&db, "newcomer", UserType::Student).await;

        create_order(&db, chop.id, regular.id, Decimal::new(5000, 2), OrderStatus::Completed, now - Duration::days(40)).await;
        create_order(&db, chop.id, regular.id, Decimal::new(6000, 2), OrderStatus::Completed, now - Duration::days(3)).await;
        create_order(&db, print.id, newcomer.id, Decimal::new(1500, 2), OrderStatus::Pending, now - Duration::days(2)).await;
        create_order(&db, print.id, newcomer.id, Decimal::new(1500, 2), OrderStatus::Cancelled, now - Duration::days(1)).await;
        create_review(&db, chop.id, newcomer.id, 4).await;

        let report = vendor_analytics(&db, vendor.id, TimeRange::Month, now).await.unwrap();

        assert_eq!(report.revenue.total, Decimal::new(9000, 2));
        assert_eq!(report.revenue.daily, Decimal::new(300, 2));
        assert_eq!(report.revenue.total.to_string(), "90.00");
        assert_eq!(report.revenue.daily.to_string(), "3.00");
        assert_eq!(report.revenue.growth, 80.0);
        assert_eq!(report.orders.total, 3);
        assert_eq!(report.orders.completed, 1);
        assert_eq!(report.orders.cancelled, 1);
        assert_eq!(report.orders.pending, 1);
        assert_eq!(report.orders.growth, 200.0);
        assert_eq!(report.customers.total, 2);
        assert_eq!(report.customers.returning, 1);
        assert_eq!(report.customers.new, 1);
        assert_eq!(report.popular_services[0].service_id, chop.id);
        assert_eq!(report.popular_services[0].average_rating, Some(Decimal::new(400, 2)));
        assert_eq!(report.location_insights.len(), 3);
    }

    #[tokio::test]
    async fn dashboard_counts_by_role_and_status() {
        let db = setup_db().await;
        let vendor = create_user(&db, "vendor", UserType::Vendor).await;
        let student = create_user(&db, "student", UserType::Student).await;
        create_user(&db, "admin", UserType::Admin).await;
        let chop = create_service(&db, vendor.id, "Chop Bar", ServiceCategory::Food, ServiceType::Ordering, None).await;
        create_order(&db, chop.id, student.id, Decimal::new(2000, 2), OrderStatus::Pending, Utc::now()).await;

        let dashboard = admin_dashboard(&db).await.unwrap();
        assert_eq!(dashboard.users.total, 3);
        assert_eq!(dashboard.users.vendors, 1);
        assert_eq!(dashboard.services.by_category.get("food"), Some(&1));
        assert_eq!(dashboard.orders.count("pending"), 1);
        assert_eq!(dashboard.payments.successful_revenue, Decimal::ZERO);
    }

    #[tokio::test]
    async fn daily_notification_rates_per_type() {
        let db = setup_db().await;
        let student = create_user(&db, "student", UserType::Student).await;
        let day = Utc.with_ymd_and_hms(2025, 5, 2, 10, 0, 0).unwrap();
        for title in ["one", "two"] {
            send_notification_at(
                &db,
                &NoopSink,
                NewNotification::new(student.id, NotificationType::OrderUpdate, title, "body").channels(true, true, false),
                day,
            )
            .await
            .unwrap();
        }

        let stats = notification_analytics(&db, day.date_naive()).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].notification_type, "order_update");
        assert_eq!(stats[0].total_sent, 2);
        assert_eq!(stats[0].delivery_rate, 100.0);
        assert_eq!(stats[0].read_rate, 0.0);
        assert_eq!(stats[0].email_sent, 2);
        assert_eq!(stats[0].sms_sent, 0);

        let per_user = notification_stats(&db, student.id).await.unwrap();
        assert_eq!(per_user.unread, 2);
        assert_eq!(per_user.by_priority.get("medium"), Some(&2));
    }
}
