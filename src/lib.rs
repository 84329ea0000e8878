pub mod lexer;
pub mod ast;
pub mod parser;
pub mod resolver;
pub mod interpreter;
pub mod printer;
