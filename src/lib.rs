pub mod builder;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod feed;
pub mod links;
pub mod matcher;
pub mod model;
pub mod numbering;
pub mod reconcile;
pub mod service;
