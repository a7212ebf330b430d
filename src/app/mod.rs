pub mod adb;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dev_server;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod models;
pub mod network;
pub mod output;
pub mod prompt;
pub mod scheduler;
