//! HTTP surface: REST and realtime endpoints for API clients, server-rendered
//! pages, and the embeddable SDK routes.

pub mod auth;
pub mod embed;
pub mod events;
pub mod extract;
pub mod menu;
pub mod pages;
pub mod server;
pub mod visitors;
pub mod ws;
