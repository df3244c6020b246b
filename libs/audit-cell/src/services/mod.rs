pub mod audit;
pub mod reports;
pub mod retention;
