pub mod click_engine;
pub mod input;
pub mod structural;
pub mod traits;
