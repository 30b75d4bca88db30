use std::io;
use std::{env, fs, path::Path};

use cinder::bytecode::compile::Compiler;
use cinder::bytecode::disasm::print_bytecode;
use cinder::frontend::lexer::Lexer;
use cinder::frontend::parser::Parser;
use cinder::frontend::token_dumper::TokenDumper;
use cinder::repl;
use cinder::runtime::vm::VM;

fn main() {
    let args: Vec<String> = env::args().collect();

    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let pretty = args.contains(&"--pretty".to_string());
    let ast = args.contains(&"--ast".to_string());
    let ast_json = args.contains(&"--ast-json".to_string());
    let bytecode = args.contains(&"--bc".to_string()) || args.contains(&"--bytecode".to_string());
    let repl_mode = args.contains(&"--repl".to_string()) || args.contains(&"-i".to_string());
    let help = args.contains(&"--help".to_string()) || args.contains(&"-h".to_string());

    if help {
        print_usage();
        return;
    }

    if repl_mode {
        run_repl();
        return;
    }

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) => {
            ensure_extension(filename);
            match fs::read_to_string(filename) {
                Ok(source) => {
                    if tokens_only {
                        dump_tokens(&source, no_color, pretty);
                    } else {
                        run_program(&source, ast, ast_json, bytecode);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    std::process::exit(1);
                }
            }
        }
        None => run_repl(),
    }
}

fn print_usage() {
    println!("CINDER - a small scripting language on a bytecode VM");
    println!();
    println!("Usage:");
    println!("  cinder                     Start interactive REPL");
    println!("  cinder <file.cdr>          Run a program");
    println!("  cinder --repl, -i          Start interactive REPL");
    println!("  cinder --tokens <file>     Show tokens only (--no-color, --pretty)");
    println!("  cinder --ast <file>        Show the parsed AST");
    println!("  cinder --ast-json <file>   Show the parsed AST as JSON");
    println!("  cinder --bc <file.cdr>     Print the compiled bytecode before running");
    println!("  cinder --help, -h          Show this help");
}

fn run_repl() {
    println!("Cinder {} — type an expression", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = repl::start(stdin.lock(), stdout.lock()) {
        eprintln!("REPL I/O error: {}", e);
        std::process::exit(1);
    }
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("cdr") {
        eprintln!("Error: expected a .cdr file, got {}", filename);
        std::process::exit(1);
    }
}

fn dump_tokens(source: &str, no_color: bool, pretty: bool) {
    match Lexer::new(source).tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();

            if no_color {
                dumper = dumper.no_color();
            }
            if pretty {
                dumper = dumper.pretty();
            }

            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_program(source: &str, ast: bool, ast_json: bool, bytecode: bool) {
    let program = match Parser::parse_source(source) {
        Ok(program) => program,
        Err(errors) => {
            for error in errors {
                eprintln!("Parse error: {}", error);
            }
            std::process::exit(1);
        }
    };

    // AST printing modes (do not reach the compiler)
    if ast {
        println!("{:#?}", program);
        return;
    }

    if ast_json {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("AST serialization error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let mut compiler = Compiler::new();
    if let Err(e) = compiler.compile(&program) {
        eprintln!("Compile error: {}", e);
        std::process::exit(1);
    }

    let compiled = compiler.bytecode();

    if bytecode {
        print_bytecode(&compiled);
    }

    let mut vm = VM::new(compiled);
    if let Err(e) = vm.run() {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
