//! Floodgate - Hierarchical Distributed Rate Limiting Service
//!
//! This crate implements an admission-control service: given a request
//! identified by one or more hierarchical principals (IP, user,
//! organization), it decides in bounded time whether to admit or reject
//! the request. Bucket state is coordinated across processes through
//! Redis with atomic server-side scripting, shielded by a local
//! hot-key mitigation layer.

pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod policy;
pub mod ratelimit;
