pub mod asserter;
pub mod cli;
pub mod filter;
pub mod log;
pub mod model;
pub mod outputter;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod spec;
pub mod suite;
pub mod validator;
