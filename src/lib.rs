//! pdh: PagerDuty for Humans.
//!
//! Incidents and users fetched from the PagerDuty API flow through a small
//! record pipeline: predicates narrow them ([`filters`]), named extractors
//! project or decorate them ([`transform`]), external executables may post-process
//! them ([`rules`]), and [`output`] renders the result as a table, JSON, YAML,
//! plain lines or raw API data.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod filters;
pub mod markup;
pub mod pipeline;
pub mod record;
pub mod transform;

pub mod output;
pub mod rules;

pub mod commands;
pub mod pagerduty;
