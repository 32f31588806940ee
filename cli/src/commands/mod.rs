// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the sitestore CLI

pub mod check;
pub mod update;

pub use self::check::CheckCommand;
pub use self::update::UpdateCommand;
