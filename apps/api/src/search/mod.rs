pub mod filter;
pub mod handlers;
pub mod prompts;
pub mod query_parser;
