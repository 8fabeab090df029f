//! # Scenario Test Suite for the Clock Face
//!
//! End-to-end checks through the public library surface, plus command line parsing.
//! Unit tests for each module live next to the code they test.

mod scenario_tests;
