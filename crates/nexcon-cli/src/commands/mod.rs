pub mod apply;
pub mod chain;
pub mod components;
pub mod export;
pub mod init;
pub mod validate;
