//! Domain layer: click events, entities, repository contracts and the relay consumer.
//!
//! # Architecture
//!
//! - [`entities`] - Advertisements and admitted clicks
//! - [`repositories`] - Durable store gateway traits
//! - [`click_event`] - The event as received at the edge or off the relay
//! - [`click_worker`] - Partition workers that persist relayed events
//!
//! # Click Processing Flow
//!
//! 1. An HTTP handler builds a [`click_event::ClickEvent`] from the request
//! 2. Synchronous path: [`crate::application::services::ClickService::record_click`]
//!    admits, persists and counts the click before responding
//! 3. Relay path: the edge admits the click and publishes it; a
//!    [`click_worker::ClickWorkerPool`] worker later persists it via
//!    [`crate::application::services::ClickService::record_relayed`]

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod repositories;
