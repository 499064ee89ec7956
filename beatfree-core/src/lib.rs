//! # beatfree-core
//!
//! The tuner engine and everything around it that is not a front-end:
//! action dispatch, TOML configuration and serializable state snapshots.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Instant;
//! use beatfree_core::config::Config;
//! use beatfree_core::tuner::Tuner;
//! use beatfree_core::dispatch::dispatch_action;
//! use beatfree_core::action::Action;
//!
//! let config = Config::load();
//! let mut tuner = Tuner::new(backend, config.tuner_settings(), config.default_activation(), DetuneMap::zeroed());
//!
//! dispatch_action(&Action::Play, &mut tuner, Instant::now());
//! dispatch_action(&Action::AutoTune, &mut tuner, Instant::now());
//!
//! // once per frame
//! tuner.tick(Instant::now());
//! ```
//!
//! ## Module Overview
//!
//! - [`tuner`]: `Tuner`, owning the activation set, transition engine and voice pool
//! - [`action`]: `Action` enum and `DispatchResult`
//! - [`dispatch`]: `dispatch_action()`, the single entry point for state mutation
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`snapshot`]: `TunerSnapshot` for persisting activation and detune

pub mod action;
pub mod config;
pub mod dispatch;
pub mod snapshot;
pub mod tuner;

pub use tuner::{Tuner, TunerSettings};
