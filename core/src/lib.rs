pub mod credentials;
pub mod db;
pub mod meal_import;
pub mod metabolic;
pub mod models;
pub mod planner;
pub mod service;
