//! Unit tests for the connection descriptor model and validator.

mod validation_tests;
