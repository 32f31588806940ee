// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Scope Domain Service
//!
//! Injects the tenant (site) predicate into hand-written SQL fragments.
//! Callers write a fragment once with the symbolic `$SITEULID` placeholder;
//! the positional number of the tenant parameter is only known at call time,
//! once the caller's own arguments are in place.
//!
//! ```text
//! "status = $1 $SITEULID"       + [draft]  -> "status = $1  site_ulid = $2"      [draft, <site>]
//! "p.status = $1 p.$SITEULID"   + [draft]  -> "p.status = $1  and p.site_ulid = $2" [draft, <site>]
//! ```
//!
//! This is substring substitution, not SQL parsing. It is only sound because
//! fragments come from application code, never from user input.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Guarantees every shared-table query carries a tenant filter

use crate::domain::sql_arg::SqlArg;
use thiserror::Error;

/// Default tenant column on every shared table
pub const SITE_ULID_COLUMN: &str = "site_ulid";

/// Default placeholder token marking where the tenant predicate goes
pub const SITE_ULID_PLACEHOLDER: &str = "$SITEULID";

/// Tenant scoping errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantScopeError {
    #[error("No $SITEULID placeholder defined in {0}")]
    MissingPlaceholder(String),
}

/// What to do with a clause that has no placeholder and no tenant predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnscopedPolicy {
    /// Fail with [`TenantScopeError::MissingPlaceholder`]
    #[default]
    Reject,
    /// Append `and <column> = $N` to the end of the clause
    Append,
}

/// Tenant predicate rewriter
///
/// Holds the column name, placeholder token and unscoped-clause policy.
/// [`TenantScope::default`] matches [`append_site_ulid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    column: String,
    placeholder: String,
    unscoped: UnscopedPolicy,
}

impl Default for TenantScope {
    fn default() -> Self {
        Self {
            column: SITE_ULID_COLUMN.to_string(),
            placeholder: SITE_ULID_PLACEHOLDER.to_string(),
            unscoped: UnscopedPolicy::Reject,
        }
    }
}

impl TenantScope {
    pub fn new(column: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            placeholder: placeholder.into(),
            unscoped: UnscopedPolicy::Reject,
        }
    }

    pub fn with_unscoped_policy(mut self, policy: UnscopedPolicy) -> Self {
        self.unscoped = policy;
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// True when `clause` already carries a finished `<column> = $N` predicate.
    ///
    /// The column must start the clause or follow a space or a table
    /// qualifier dot, and `$` must be followed by a digit.
    pub fn is_scoped(&self, clause: &str) -> bool {
        let needle = format!("{} = $", self.column);
        clause.match_indices(&needle).any(|(idx, _)| {
            let boundary = clause[..idx]
                .chars()
                .next_back()
                .map_or(true, |c| c == ' ' || c == '.');
            let numbered = clause[idx + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());
            boundary && numbered
        })
    }

    /// Rewrite `clause` so it filters on `site_ulid`, appending the tenant
    /// argument to `args`.
    ///
    /// # Returns
    /// * `Ok((clause, args))` - unchanged if already scoped with no placeholder
    ///   left, otherwise rewritten with `site_ulid` bound at position `args.len()`
    /// * `Err(TenantScopeError::MissingPlaceholder)` - no placeholder and the
    ///   policy is [`UnscopedPolicy::Reject`]
    pub fn append(
        &self,
        site_ulid: &str,
        clause: &str,
        mut args: Vec<SqlArg>,
    ) -> Result<(String, Vec<SqlArg>), TenantScopeError> {
        // A remaining placeholder still needs scoping even next to a finished predicate
        if self.is_scoped(clause) && !clause.contains(&self.placeholder) {
            return Ok((clause.to_string(), args));
        }

        let Some(at) = clause.find(&self.placeholder) else {
            return match self.unscoped {
                UnscopedPolicy::Reject => {
                    Err(TenantScopeError::MissingPlaceholder(clause.to_string()))
                }
                UnscopedPolicy::Append => {
                    args.push(SqlArg::Text(site_ulid.to_string()));
                    let predicate = self.predicate(args.len());
                    let rewritten = if clause.trim().is_empty() {
                        predicate
                    } else {
                        format!("{clause} and {predicate}")
                    };
                    Ok((rewritten, args))
                }
            };
        };

        args.push(SqlArg::Text(site_ulid.to_string()));
        let predicate = self.predicate(args.len());

        let head = &clause[..at];
        let rewritten = if head.ends_with('.') {
            // Table-qualified: "p.$SITEULID" becomes " and p.site_ulid = $N"
            let prefix = head.rsplit(char::is_whitespace).next().unwrap_or_default();
            clause.replace(
                &format!("{prefix}{}", self.placeholder),
                &format!(" and {prefix}{predicate}"),
            )
        } else {
            clause.replace(&self.placeholder, &format!(" {predicate}"))
        };

        Ok((rewritten, args))
    }

    fn predicate(&self, position: usize) -> String {
        format!("{} = ${}", self.column, position)
    }
}

/// Scope `where_clause` to `site_ulid` using the default column, placeholder
/// and [`UnscopedPolicy::Reject`].
pub fn append_site_ulid(
    site_ulid: &str,
    where_clause: &str,
    args: Vec<SqlArg>,
) -> Result<(String, Vec<SqlArg>), TenantScopeError> {
    TenantScope::default().append(site_ulid, where_clause, args)
}
