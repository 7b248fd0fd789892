//! Integration tests for ajum-index
//!
//! `fetcher_tests` talks to a wiremock server over real HTTP; the pipeline
//! tests run against an in-process stub site that counts every request.

mod fetcher_tests;
mod pipeline_tests;
mod support;
