pub mod entities;
pub mod services;

#[cfg(test)]
pub mod memory_store;
