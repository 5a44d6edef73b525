pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod documents;
pub mod error_handling;
pub mod handlers;
pub mod network;
pub mod pipeline;
pub mod storage;
pub mod targets;
pub mod web_interface;
