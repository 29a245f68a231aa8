//! Gallerysync Core - Domain model and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SourceAlbum`, `SourceItem`, `Checkpoint`, manifests, `FailureState`
//! - **Port definitions** - Traits for adapters: `ISourceCollection`, `IBlobStore`,
//!   `ICheckpointStore`, `INotificationService`
//! - **Configuration** - YAML configuration with validation and env overrides
//!
//! # Architecture
//!
//! The domain module contains pure data and rules with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`gallerysync-cloud`, `gallerysync-cache`). The orchestration lives in
//! `gallerysync-sync`.

pub mod config;
pub mod domain;
pub mod ports;
