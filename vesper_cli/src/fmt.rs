// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use console::style;
use vesper_parser::ParseError;

/// Renders a parse error with its source line and a caret under the
/// offending column.
pub fn print_parse_error(error: &ParseError, path: &str, source: &str) {
    eprintln!(
        "{} {}",
        style(format!("{path}:{}:{}", error.line, error.column)).dim(),
        style(&error.message).red().bold()
    );
    if let Some(line) = source.lines().nth(error.line as usize - 1) {
        eprintln!("  {line}");
        let caret_offset = (error.column as usize).saturating_sub(1);
        eprintln!("  {}{}", " ".repeat(caret_offset), style("^").red().bold());
    }
}

pub fn print_runtime_error(message: &str) {
    eprintln!("{} {}", style("Uncaught").red().bold(), style(message).red());
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), message);
}
