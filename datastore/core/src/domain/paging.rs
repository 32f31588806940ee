// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Paged result DTOs returned by list endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sort direction, sanitized so it can be interpolated into `ORDER BY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse a user-supplied direction; anything but `desc` is ascending
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

// Query strings carry arbitrary text; unknown values fall back to ascending
impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Direction::parse(&raw))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Page request parsed from list query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub sort: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub search: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// 1-based page number
    #[serde(default = "default_page_num")]
    pub page_num: u32,
}

fn default_limit() -> u32 {
    50
}

fn default_page_num() -> u32 {
    1
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            sort: String::new(),
            direction: Direction::Asc,
            search: String::new(),
            limit: default_limit(),
            page_num: default_page_num(),
        }
    }
}

impl PageRequest {
    /// Row offset for `OFFSET`; page 0 is treated as page 1
    pub fn offset(&self) -> u64 {
        u64::from(self.page_num.max(1) - 1) * u64::from(self.limit)
    }

    /// Wrap a fetched page of records with the request that produced it
    pub fn into_paged<T>(self, records: T, total: i64) -> PagedData<T> {
        PagedData {
            sort: self.sort,
            search: self.search,
            direction: self.direction,
            records,
            total,
            page_num: self.page_num.max(1),
            limit: self.limit,
        }
    }
}

/// One page of records plus the total row count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedData<T> {
    pub sort: String,
    pub search: String,
    pub direction: Direction,
    pub records: T,
    pub total: i64,
    pub page_num: u32,
    pub limit: u32,
}
