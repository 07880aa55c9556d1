pub mod analysis;
pub mod ast;
pub mod codegen;
pub mod compile;
pub mod dump;
pub mod error;
pub mod grammar;
pub mod types;
pub mod vm;
