use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

/// Diagnostic printer behind the CLI's `--tokens` flag.
pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints a nicer value for some tokens
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const RED: &'static str = "\x1b[31m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for spanned in tokens {
            self.print_one(spanned);
        }
    }

    fn print_one(&self, s: &Spanned) {
        let line = s.span.line;
        let col = s.span.col;

        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        if self.show_debug_repr {
            println!(
                "[{:02}:{:02}] {}{:<8} {:?}{}",
                line, col, colr, kind, s.token, reset
            );
        } else {
            println!(
                "[{:02}:{:02}] {}{:<8} {}{}",
                line, col, colr, kind, s.token, reset
            );
        }
    }

    fn kind(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Eof => "EOF",
            Illegal(_) => "ILLEGAL",

            // literals
            Int(_) => "INT",
            Float(_) => "FLOAT",
            Str(_) => "STRING",

            // names
            Ident(_) => "IDENT",

            // structure
            LParen | RParen => "PAREN",
            LBrace | RBrace => "BRACE",
            LBracket | RBracket => "BRACKET",
            Comma | Semicolon | Colon => "DELIM",

            // ops / comparisons
            Plus | Minus | Asterisk | Slash | Bang | Assign => "OP",
            Eq | NotEq | Lt | Gt => "CMP",

            // everything else = keyword
            _ => "KEYWORD",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Eof => Self::DIM,
            Illegal(_) => Self::RED,
            Str(_) => Self::GRN,
            Int(_) | Float(_) => Self::CYN,
            Ident(_) => Self::YEL,
            Plus | Minus | Asterisk | Slash | Bang | Assign => Self::MAG,
            Eq | NotEq | Lt | Gt => Self::MAG,
            _ => Self::RESET,
        }
    }
}
