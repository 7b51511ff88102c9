//! Output formatting and styling module.
//!
//! Console output for the command line: status lines, the routing table shown
//! at startup and the per-category summary printed on shutdown. Notifications
//! and log lines are not written here.

use colored::*;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use downsort::output::OutputFormatter;
    /// OutputFormatter::warning("Destination /home/user/Music does not exist");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints where each category's files go.
    ///
    /// `rows` are `(category, destination, extension count)`.
    pub fn routing_table(rows: &[(String, String, usize)]) {
        Self::header("CATEGORIES");

        let width = rows
            .iter()
            .map(|(name, _, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Destination".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 24));
        for (name, destination, extensions) in rows {
            println!(
                "{:<width$} | {} {}",
                name,
                destination.green(),
                format!("({extensions} extensions)").dimmed(),
                width = width
            );
        }
    }

    /// Prints a summary table with moved files by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use downsort::output::OutputFormatter;
    ///
    /// let counts = vec![("Pictures".to_string(), 3), ("Music".to_string(), 1)];
    /// OutputFormatter::summary_table(&counts, 2);
    /// ```
    pub fn summary_table(category_counts: &[(String, usize)], failures: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Moved".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word(*count),
                width = width
            );
        }

        let total: usize = category_counts.iter().map(|(_, count)| count).sum();
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            file_word(total),
            width = width
        );
        if failures > 0 {
            println!(
                "{:<width$} | {}",
                "Failed".bold(),
                failures.to_string().red().bold(),
                width = width
            );
        }
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
