pub mod config;
pub mod db;
pub mod explain;
pub mod export;
pub mod pipeline;
pub mod queries;
pub mod report;
pub mod schema;
