// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Multi-tenant data access for sitestore: tenant predicate rewriting,
//! full-text search normalization, the database log bridge and the
//! connection bootstrap behind the [`Datastore`] facade.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain services plus PostgreSQL infrastructure

pub mod domain;
pub mod infrastructure;

pub use domain::search::format_search;
pub use domain::sql_arg::SqlArg;
pub use domain::tenant_scope::{append_site_ulid, TenantScope, TenantScopeError};
pub use infrastructure::{bootstrap, Datastore, DatastoreError};
