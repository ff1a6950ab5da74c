//! Utility functions and helpers.

pub mod dotenv;
pub mod id_generator;

// Re-export commonly used types
pub use dotenv::load_dotenv;
pub use id_generator::IdGenerator;
