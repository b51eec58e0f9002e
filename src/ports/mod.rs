//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces the feed's core requires from the outside
//! world, plus the typed contracts both halves of the system share.
//! Adapters implement these traits; tests mock them.
//!
//! Port categories:
//! - `events`: Typed event unions and the client connection mode
//! - `envelope`: The message envelope both ends of the persistent
//!   channel speak
//! - `transport`: Push-channel and snapshot-API traits behind the
//!   hybrid client connector

pub mod envelope;
pub mod events;
pub mod transport;
