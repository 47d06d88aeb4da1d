//! Route handlers

pub mod fields;
pub mod forms;
pub mod health;
pub mod submissions;
