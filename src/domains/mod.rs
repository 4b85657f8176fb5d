pub mod loyalty;

// Re-export domain modules for easier access
pub use loyalty as loyalty_service;
