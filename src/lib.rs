#[macro_use]
pub mod log;

pub mod adapters;
pub mod command;
pub mod config;
pub mod db;
pub mod event;
pub mod maimai;
pub mod message;
pub mod permission;
pub mod plugins;
pub mod services;

#[cfg(test)]
mod testing;
