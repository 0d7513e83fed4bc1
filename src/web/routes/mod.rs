pub mod container_routes;
pub mod server_routes;
pub mod user_routes;
