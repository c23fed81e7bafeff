//! Codec tests over synthetic in-memory files

mod builder_tests;
