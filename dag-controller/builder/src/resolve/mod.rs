//! Policy resolvers.
//!
//! Each resolver is a pure function that combines locally configured policy
//! with process-wide defaults. Resolvers never look at the cache or the DAG.

pub mod circuit_breaker;
pub mod headers;
pub mod ratelimit;
pub mod retry;
pub mod timeout;
