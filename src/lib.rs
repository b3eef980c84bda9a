pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod idgen;
pub mod importer;
pub mod logging;
pub mod matcher;
pub mod parser;
pub mod pipeline;
pub mod storage;
