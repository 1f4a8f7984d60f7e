//! Email triage: classifies emails as productive or unproductive and
//! suggests a reply.

pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod routes;
