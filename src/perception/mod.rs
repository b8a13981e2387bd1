pub mod capture;
pub mod traits;
pub mod types;
pub mod vision;
