// Core library: configuration, projections, draft state and the valuation engine.

pub mod config;
pub mod draft;
pub mod engine;
pub mod projections;
pub mod valuation;

#[cfg(test)]
pub(crate) mod test_support;
