//! Integration tests against an in-memory store.
//!
//! Sections:
//! 1. Entity operations through the template
//! 2. Query execution in every result shape
//! 3. Table creation, validation and removal

pub mod dispatch_tests;
pub mod helpers;
pub mod schema_tests;
pub mod template_tests;
