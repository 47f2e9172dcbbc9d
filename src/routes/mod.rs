pub mod admin;
pub mod audit;
pub mod auth;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tags;
pub mod tasks;
