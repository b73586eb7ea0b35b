//! Configuration module

pub mod cli;
pub mod reader_config;
pub mod validator;

pub use cli::CliArgs;
pub use reader_config::{
    ReaderConfig, DEFAULT_EPOCHS, DEFAULT_SHUFFLE, DEFAULT_START_SAMPLE_INDEX,
    DEFAULT_STOP_SAMPLE_INDEX,
};
pub use validator::{validate, ValidatedPlan};
