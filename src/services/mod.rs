pub mod auth_service;
pub mod container_service;
pub mod encryption_service;
