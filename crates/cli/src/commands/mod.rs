//! CLI Commands

pub mod plan;
