//! Client-side synchronization and layout engine for watching a running
//! multi-agent trading simulation.
//!
//! The crate polls the simulation backend for new events, reconciles them into
//! an append-only feed, projects the leaderboard and run status, and maintains
//! a force-directed layout of the agents' trading relationships.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod feed;
pub mod graph;
pub mod launcher;
pub mod leaderboard;
pub mod model;
pub mod poll;
pub mod selection;
pub mod session;
pub mod status;
