pub mod audit;
pub mod catalog;
pub mod context;
pub mod health;
pub mod members;
