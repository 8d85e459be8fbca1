//! Archives Google Code-in task data from the program API into a local
//! directory tree, and submits locally defined tasks back to it.

pub mod archive;
pub mod config;
pub mod connectors;
pub mod model;
pub mod sanitize;
pub mod submit;
