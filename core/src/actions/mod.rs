// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! The action model (C4) and factory (C5): a closed, recursively
//! composable family of action kinds, each with a declarative config
//! ([`config::ActionConfig`]) and a runtime counterpart
//! ([`runtime::RuntimeAction`]).

pub mod config;
pub mod factory;
pub mod relative;
pub mod runtime;

pub use config::ActionConfig;
pub use factory::{ActionFactory, Services};
pub use runtime::RuntimeAction;
