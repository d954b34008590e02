// Wire-level message value and frame codec
pub mod message;

// Per-connection client actor
pub mod client;

// Single-writer hub dispatcher
pub mod hub;

// Token -> identity resolution
pub mod session;

// Token extraction helpers
pub mod auth;

// Configuration loading
pub mod config;

// HTTP and WebSocket APIs
pub mod api;
