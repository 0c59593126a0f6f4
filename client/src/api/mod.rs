//! Access to the reporting service.

mod client;
mod wire;

pub use client::{ApiClient, LaunchApi, LaunchPage, USER_AGENT_VALUE};
pub use wire::{ITEM_PAGE_SIZE, decode_item_page, decode_launch_page, item_query, launch_query};
