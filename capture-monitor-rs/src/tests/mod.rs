//! Scenario tests for the capture monitor
//!
//! Pipeline tests run against the in-memory object and trace stores and a
//! scripted judge; HTTP clients are exercised against WireMock servers.


pub mod decoder_tests;
pub mod error_tests;
pub mod handler_tests;
pub mod record_tests;
pub mod tracking_mock_tests;
