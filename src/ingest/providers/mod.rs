// src/ingest/providers/mod.rs
pub mod github;
pub mod hacker_news;
pub mod reddit;
