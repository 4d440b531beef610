//! PIK Tour - action-gated onboarding tours for the PIK Visual block editor
//!
//! The engine lives in [`tour`]. [`replay`] drives it from scripted editor
//! sessions; [`config`] and [`logging`] are shared with the `pik-tour` binary.

pub mod config;
pub mod example;
pub mod logging;
pub mod replay;
pub mod tour;
