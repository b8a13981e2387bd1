pub mod space;
pub mod types;
