#![warn(clippy::unwrap_used)]

pub mod campaign_rest;
pub mod coupon_rest;
pub mod rest;
pub mod server;

pub use server::{router, ApiServer};
