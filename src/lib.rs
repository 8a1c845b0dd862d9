//! Truck loading engine.
//!
//! Packs delivery boxes into a truck's cargo space with an epsilon-greedy,
//! multi-restart heuristic. Placements respect boundary, overlap, fragility and
//! support rules; arrangements are scored on unloading effort (later deliveries
//! should not block the door) against structural stability.
//!
//! The engine ([`container`], [`candidates`], [`scoring`], [`packer`],
//! [`optimizer`]) is free of I/O; [`api`] and [`config`] wrap it as an HTTP service.

pub mod api;
pub mod candidates;
pub mod config;
pub mod container;
pub mod geometry;
pub mod heightmap;
pub mod model;
pub mod optimizer;
pub mod packer;
pub mod scoring;
pub mod types;
