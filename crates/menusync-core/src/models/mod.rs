//! Data models for canteen entities.
//!
//! This module contains the data structures used to represent
//! remote canteen data:
//!
//! - `MenuParams`, `InfoParams`, `Language`: keys that select which data is synced
//! - `Dish`, `Prices`: menu listings
//! - `InfoPage`: static information pages

pub mod info;
pub mod menu;
pub mod params;

pub use info::InfoPage;
pub use menu::{group_by_category, Dish, Menu, Prices};
pub use params::{InfoParams, Language, MenuParams};
