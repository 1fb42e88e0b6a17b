//! Statement execution: CREATE, INSERT, single-table SELECT and PRAGMA

pub mod create;
pub mod expr;
pub mod insert;
pub mod pragma;
pub mod select;

pub use create::{execute_create_index, execute_create_table, CreateOutcome};
pub use expr::{eval_expr, DefaultEvaluator, Evaluator, RowContext};
pub use insert::{execute_insert, insert_into, InsertContext, InsertOutcome};
pub use pragma::{execute_pragma, PragmaResult};
pub use select::{execute_select, ResultSet};
