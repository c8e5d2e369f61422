pub mod config;
pub mod consts;
pub mod error;
pub mod geo;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod stages;
