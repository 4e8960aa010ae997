pub mod config;
pub mod index;
pub mod limits;
pub mod model;
pub mod observability;
pub mod reconcile;
pub mod report;
pub mod scheduler;
pub mod source;
