pub mod holding;
pub mod series;
