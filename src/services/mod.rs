pub mod activity_log;
pub mod auth_service;
