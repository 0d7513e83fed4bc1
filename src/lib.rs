pub mod server;

pub mod cache;
pub mod db;
pub mod docker;
pub mod services;
pub mod ssh;
pub mod version;
pub mod web;
