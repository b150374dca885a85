pub mod analytics;
pub mod assist;
pub mod calendar;
pub mod contact;
pub mod qr;
pub mod qr_library;
pub mod role;
pub mod routes;
pub mod workflow;
