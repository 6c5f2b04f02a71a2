pub mod config;
pub mod convert;
pub mod encoding;
pub mod frame;
pub mod mode;
