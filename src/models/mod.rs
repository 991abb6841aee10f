// src/models/mod.rs

pub mod category;
pub mod post;
pub mod thread;
pub mod user;
