pub mod api;
pub mod browser;
pub mod config;
pub mod data_models;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod service;
pub mod target;
