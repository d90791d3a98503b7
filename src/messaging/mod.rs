// Messaging - Notifications to the UI and rate-limited setters

pub mod channels;
pub mod notification;
pub mod rate_limit;
