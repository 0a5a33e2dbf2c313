// Plan prompt construction. No I/O in this module.

pub mod prompt_builder;
pub mod prompts;
