use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser as ClapParser, Subcommand};

use rowan_lang::ast::Stmt;
use rowan_lang::interpreter::Interpreter;
use rowan_lang::lexer::tokens::{Token, TokenType};
use rowan_lang::lexer::Lexer;
use rowan_lang::parser::Parser;
use rowan_lang::printer;
use rowan_lang::resolver::Resolver;

#[derive(ClapParser)]
#[command(name = "rowan", version, about = "The Rowan programming language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the token stream (debug)
    Tokenize {
        /// Path to .rw file
        file: PathBuf,
    },
    /// Parse and display the AST
    Parse {
        /// Path to .rw file
        file: PathBuf,
    },
    /// Execute a script
    Run {
        /// Path to .rw file
        file: PathBuf,
    },
    /// Start an interactive session
    Repl,
}

// Syntax and resolution errors exit with 65, runtime errors with 70.
const EXIT_STATIC_ERROR: i32 = 65;
const EXIT_RUNTIME_ERROR: i32 = 70;

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Tokenize { file } => cmd_tokenize(&file),
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Run { file } => cmd_run(&file),
        Commands::Repl => cmd_repl(),
    };
    process::exit(exit_code);
}

const MAX_SOURCE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

fn read_source(path: &PathBuf) -> Result<String, i32> {
    let filename = path.to_string_lossy();

    // Check file size before reading
    match std::fs::metadata(path) {
        Ok(meta) => {
            if meta.len() > MAX_SOURCE_SIZE {
                eprintln!(
                    "Error: file {} is too large ({} bytes, max {} bytes)",
                    filename,
                    meta.len(),
                    MAX_SOURCE_SIZE
                );
                return Err(1);
            }
        }
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            return Err(1);
        }
    }

    match std::fs::read_to_string(path) {
        Ok(source) => Ok(source),
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            Err(1)
        }
    }
}

fn lex(source: &str) -> Result<Vec<Token>, i32> {
    let (tokens, errors) = Lexer::new(source).tokenize();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error);
        }
        return Err(EXIT_STATIC_ERROR);
    }
    Ok(tokens)
}

fn lex_and_parse(source: &str) -> Result<Vec<Stmt>, i32> {
    let tokens = lex(source)?;
    let (statements, errors) = Parser::new(tokens).parse();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error);
        }
        return Err(EXIT_STATIC_ERROR);
    }
    Ok(statements)
}

fn cmd_tokenize(path: &PathBuf) -> i32 {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let tokens = match lex(&source) {
        Ok(tokens) => tokens,
        Err(code) => return code,
    };
    for token in &tokens {
        println!("{}", token);
    }
    0
}

fn cmd_parse(path: &PathBuf) -> i32 {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let statements = match lex_and_parse(&source) {
        Ok(statements) => statements,
        Err(code) => return code,
    };
    println!("{}", printer::print_program(&statements));
    0
}

fn cmd_run(path: &PathBuf) -> i32 {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let statements = match lex_and_parse(&source) {
        Ok(statements) => statements,
        Err(code) => return code,
    };

    let mut interpreter = Interpreter::new();
    let errors = Resolver::new(&mut interpreter).resolve(&statements);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error);
        }
        return EXIT_STATIC_ERROR;
    }

    match interpreter.interpret(&statements) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("{}", error);
            EXIT_RUNTIME_ERROR
        }
    }
}

fn cmd_repl() -> i32 {
    let stdin = io::stdin();
    let mut interpreter = Interpreter::new();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: cannot read input: {}", e);
                return 1;
            }
        }

        // Errors never end the session; each line starts clean.
        run_repl_line(&mut interpreter, &line);
    }
    0
}

fn run_repl_line(interpreter: &mut Interpreter, line: &str) {
    let (mut tokens, errors) = Lexer::new(line).tokenize();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error);
        }
        return;
    }

    insert_trailing_semicolon(&mut tokens);

    let (mut statements, errors) = Parser::new(tokens).parse();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error);
        }
        return;
    }

    // A bare trailing expression echoes its value.
    if let Some(last) = statements.pop() {
        statements.push(match last {
            Stmt::Expression { expression } => Stmt::Print { expression },
            other => other,
        });
    }

    let errors = Resolver::new(interpreter).resolve(&statements);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error);
        }
        return;
    }

    if let Err(error) = interpreter.interpret(&statements) {
        eprintln!("{}", error);
    }
}

/// Let the user skip the final `;` at the prompt. The token before Eof gets
/// a `;` after it unless it already ends a statement or block.
fn insert_trailing_semicolon(tokens: &mut Vec<Token>) {
    if tokens.len() < 2 {
        return;
    }
    let last = &tokens[tokens.len() - 2];
    match last.token_type {
        TokenType::Semicolon | TokenType::RightBrace => {}
        _ => {
            let line = last.line;
            let eof = tokens.len() - 1;
            tokens.insert(eof, Token::new(TokenType::Semicolon, ";", None, line));
        }
    }
}
