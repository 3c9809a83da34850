pub mod asset;
pub mod commands;
pub mod download;
pub mod group;
pub mod http;
pub mod overlay;
pub mod runtime;
