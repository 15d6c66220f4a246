//! Work-breakdown structure: hierarchical cost rollup and CRUD routes.

pub mod rollup;
pub mod routes;
