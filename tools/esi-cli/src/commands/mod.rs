//! CLI command implementations.

pub mod assemble;
pub mod check;
pub mod parse;

use clap::Args;

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Include tag, e.g. `<esi:include src="https://svc/cart"/>`, or the bare
    /// directive text.
    pub tag: String,
}

/// Arguments for the assemble command.
#[derive(Args)]
pub struct AssembleArgs {
    /// Page file to assemble (`-` reads stdin).
    pub file: String,

    /// Request path used to select the scope.
    #[arg(short, long, default_value = "/")]
    pub path: String,

    /// Request method.
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header, `Name: value`. May be repeated.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
}
