//! End-to-end crawls against wiremock servers

mod crawl_tests;
