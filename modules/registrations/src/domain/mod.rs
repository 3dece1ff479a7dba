pub mod error;
pub mod events;
pub mod locks;
pub mod policy;
pub mod ports;
pub mod repo;
pub mod service;
