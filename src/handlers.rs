pub mod analytics;
pub mod assistant;
pub mod auth;
pub mod bookings;
pub mod complaints;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod services;
pub mod sockets;
pub mod users;
pub mod vendor_applications;
pub mod vendor_profiles;
