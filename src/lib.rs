pub mod admin;
pub mod auth;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod form;
pub mod models;
pub mod reservation;
pub mod schedule;
pub mod store;
pub mod view;
pub mod web;
