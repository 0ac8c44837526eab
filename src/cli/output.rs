//! Colored output helpers for CLI
//!
//! Answers stream to stdout; status lines go to stdout as well, errors to
//! stderr. Logging is on stderr and never interleaves with an answer.

use owo_colors::OwoColorize;
use std::io::{self, Write};

use freestream::rag::retriever::Citation;

/// Longest excerpt shown under a source line.
const EXCERPT_CHARS: usize = 120;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n  {} {}",
                "FreeStream RAGbot".bright_cyan().bold(),
                version.dimmed()
            );
            println!("  {}\n", "Ask questions about your documents".dimmed());
        } else {
            println!("\n  FreeStream RAGbot {}", version);
            println!("  Ask questions about your documents\n");
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print an application error as kind, message and component
    pub fn app_error(&self, error: &freestream::AppError) {
        let line = format!("{} ({}): {}", error.kind(), error.component(), error);
        self.error(&line);
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<18}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 19).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 19));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<18}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }

    /// REPL input prompt; does not end the line
    pub fn prompt(&self) {
        if self.colored {
            print!("\n{} ", "you>".bright_green().bold());
        } else {
            print!("\nyou> ");
        }
        io::stdout().flush().ok();
    }

    /// Label printed before an answer starts streaming
    pub fn answer_label(&self, model: &str) {
        if self.colored {
            print!("{} ", format!("{}>", model).bright_cyan().bold());
        } else {
            print!("{}> ", model);
        }
        io::stdout().flush().ok();
    }

    /// Write one answer fragment as it arrives
    pub fn token(&self, text: &str) {
        print!("{}", text);
        io::stdout().flush().ok();
    }

    /// Print the sources backing an answer
    pub fn citations(&self, citations: &[Citation]) {
        if citations.is_empty() {
            return;
        }
        if self.colored {
            println!("\n  {}", "Sources".cyan().bold());
        } else {
            println!("\n  --- Sources ---");
        }
        for citation in citations {
            let label = format!(
                "[{}] {} (chars {}-{}, score {:.3})",
                citation.marker, citation.filename, citation.start, citation.end, citation.score
            );
            let excerpt = excerpt(&citation.excerpt);
            if self.colored {
                println!("    {}", label.bright_white());
                println!("      {}", excerpt.dimmed());
            } else {
                println!("    {}", label);
                println!("      {}", excerpt);
            }
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

/// First characters of a passage on a single line.
fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
        assert!(Output::default().colored);
    }

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("The sky\n\nis  blue."), "The sky is blue.");
        let long = "word ".repeat(100);
        let short = excerpt(&long);
        assert!(short.ends_with('…'));
        assert!(short.chars().count() <= EXCERPT_CHARS + 1);
    }

    #[test]
    fn test_output_methods_no_panic() {
        let citation = Citation {
            marker: 1,
            document_id: Uuid::nil(),
            filename: "sky.txt".to_string(),
            chunk_index: 0,
            start: 0,
            end: 16,
            score: 0.92,
            excerpt: "The sky is blue.".to_string(),
        };
        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("indexed");
            output.info("info");
            output.warning("warning");
            output.error("error");
            output.created("config", "freestream.toml");
            output.skipped("freestream.toml", "exists");
            output.header("Models");
            output.kv("key", "value");
            output.hint("hint");
            output.command("freestream chat notes.txt");
            output.table_header(&["Model", "Provider"]);
            output.table_row(&["GPT-3.5 Turbo", "openai"]);
            output.answer_label("GPT-3.5 Turbo");
            output.token("Blue.");
            output.citations(std::slice::from_ref(&citation));
            output.citations(&[]);
            output.newline();
        }
    }
}
