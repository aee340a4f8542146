pub mod lexer;
mod object;
mod refs;

pub use lexer::{Lexer, Token};
pub use object::Parser;
pub use refs::{reference_spans, RefSpan};
