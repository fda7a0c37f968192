//! DAL Comprehensive Test Suite
//!
//! End-to-end tests of the public API against the in-memory adapter.
//!
//! ## Test Tier Structure
//!
//! - **Tier 1: Sessions** (get/set/insert/update/delete semantics)
//! - **Tier 2: Transactions** (isolation, rollback, conflict retry)
//! - **Tier 3: Queries** (filters, ordering, paging, cursors, readers)
//! - **Tier 4: Recordsets** (columnar projection and aggregates)
//! - **Tier 5: Generated ids** (random ids, collisions, exhaustion)
//! - **Tier 6: Configuration** (`dal.toml` loading and defaults)
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test dal_comprehensive
//!
//! # Only transaction tests
//! cargo test --test dal_comprehensive transaction
//! ```

mod test_utils;

// Tier 1
mod session_tests;

// Tier 2
mod transaction_tests;

// Tier 3
mod query_tests;

// Tier 4
mod recordset_tests;

// Tier 5
mod insert_tests;

// Tier 6
mod config_tests;
