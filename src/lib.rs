// cinefetch: movie metadata and artwork aggregation behind a tiered cache

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use services::images::ImagePipeline;
use services::metadata::MetadataService;

pub struct AppState {
    pub metadata: Arc<MetadataService>,
    pub images: Arc<ImagePipeline>,
}
