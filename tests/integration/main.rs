//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the detector end to end
//! against the simulated codec.  All tests run on the host with no real
//! hardware required.

mod detection_flow_tests;
mod mock_hw;
mod removal_tests;
