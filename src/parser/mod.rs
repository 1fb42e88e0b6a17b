//! SQL parser: tokenization, naming rules and AST

pub mod ast;
pub mod grammar;
pub mod ident;
pub mod tokenizer;

pub use grammar::{parse, parse_all, parse_create_index, parse_create_table, Parser};
pub use ident::{Identifier, QuoteStyle};
