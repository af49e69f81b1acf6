//! Workspace root package.
//!
//! Carries no code; it exists so cargo-husky installs the shared git
//! hooks when the workspace is built.
