pub mod config;
pub mod map;
pub mod project;
pub mod run;
pub mod stages;
