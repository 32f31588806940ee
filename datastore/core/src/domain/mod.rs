// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure query-building services and the collaborator contracts the
//! datastore consumes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tenant scoping, search normalization, paging DTOs, contracts

pub mod cache;
pub mod file_storage;
pub mod paging;
pub mod publisher;
pub mod search;
pub mod settings;
pub mod sql_arg;
pub mod tenant_scope;
