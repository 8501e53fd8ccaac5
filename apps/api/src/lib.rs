//! ResumeTailor API: LaTeX-to-PDF compilation for the resume editor, plus
//! thin proxies to the account and GitHub-import backend.

pub mod backend;
pub mod compile;
pub mod config;
pub mod editor;
pub mod errors;
pub mod routes;
pub mod state;
