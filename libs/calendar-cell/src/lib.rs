pub mod handlers;
pub mod interval;
pub mod models;
pub mod router;
pub mod services;
