pub mod notifications;
pub mod period_alert;
pub mod session;
pub mod storage;
