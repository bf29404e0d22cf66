pub mod api;
pub mod config;
pub mod demo_feed;
pub mod formation;
pub mod http_cache;
pub mod http_client;
pub mod provider;
pub mod retry;
pub mod roster;
pub mod state;
pub mod view;
