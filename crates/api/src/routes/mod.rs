pub mod admin;
pub mod clients;
pub mod health;
pub mod token;
pub mod users;
