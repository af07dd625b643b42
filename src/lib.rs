#![cfg_attr(not(test), no_std)]

pub mod beacon;
pub mod config;
pub mod logger;
pub mod radio;
pub mod tag;
