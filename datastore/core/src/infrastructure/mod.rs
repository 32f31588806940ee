// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod bootstrap;
pub mod connection;
pub mod datastore;
pub mod db_log;

pub use bootstrap::{bootstrap, BootstrapConfig, BootstrapError, LivenessPolicy, PoolLimits};
pub use datastore::{Datastore, DatastoreError, DatastoreTransaction, PoolStatus};
pub use db_log::{DbLogger, LogEvent, LogSink, Severity};
