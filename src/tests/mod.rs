//! Shared test support and cross-module scenarios.
