//! Cross-module tests of the navigator pipeline.

mod scenarios;
mod support;
