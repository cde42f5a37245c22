pub mod app;
pub mod config;
pub mod datasets;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod http;
pub mod layout;
pub mod output;
pub mod provenance;
pub mod store;
pub mod verify;
