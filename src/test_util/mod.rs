//! Utilities for testing code that talks to the service through [crate::rest::RestClient]. They
//!  are used for testing the crate itself, but they are also exported for application testing.

pub mod transport;
