pub mod cache;
pub mod openweather;
pub mod types;
