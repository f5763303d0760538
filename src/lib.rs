pub mod clean;
pub mod config;
pub mod pipeline;
pub mod quota;
pub mod survey;
