//! Terminal styling for the binphi CLI

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static TREND: Emoji<'_, '_> = Emoji("📈 ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
    ██████╗ ██╗███╗   ██╗██████╗ ██╗  ██╗██╗
    ██╔══██╗██║████╗  ██║██╔══██╗██║  ██║██║
    ██████╔╝██║██╔██╗ ██║██████╔╝███████║██║
    ██╔══██╗██║██║╚██╗██║██╔═══╝ ██╔══██║██║
    ██████╔╝██║██║ ╚████║██║     ██║  ██║██║
    ╚═════╝ ╚═╝╚═╝  ╚═══╝╚═╝     ╚═╝  ╚═╝╚═╝
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        style("φ").magenta().bold(),
        style("Optimal binning as simple as phi").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Settings shown in the configuration card
pub struct ConfigCard<'a> {
    pub input: &'a Path,
    pub target: &'a str,
    pub output: Option<&'a Path>,
    pub max_bins: usize,
    pub min_bin_size: f64,
    pub trend: String,
}

/// Print configuration card
pub fn print_config(card: &ConfigCard) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);
    let output = card
        .output
        .map(|p| truncate_path(p, 38))
        .unwrap_or_else(|| "-".to_string());

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Input:  {:<39}│", FOLDER, truncate_path(card.input, 38));
    println!("    │  {} Target: {:<39}│", TARGET, truncate_string(card.target, 38));
    println!("    │  {} Model:  {:<39}│", SAVE, output);
    println!("    ├{}┤", line);
    println!(
        "    │  {} Max bins:     {:<33}│",
        CHART,
        style(card.max_bins).yellow()
    );
    println!(
        "    │  {} Min bin size: {:<33}│",
        CHART,
        style(format!("{:.1}%", card.min_bin_size * 100.0)).yellow()
    );
    println!(
        "    │  {} Trend:        {:<33}│",
        TREND,
        style(&card.trend).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("    {} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Print the elapsed time of a step
pub fn print_step_time(elapsed: Duration) {
    println!(
        "    {}",
        style(format!("⏱  {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("binphi complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(info) = detail {
        println!(
            "      {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!("      {} {}", style(count).yellow().bold(), description);
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let n_chars = s.chars().count();
    if n_chars <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(n_chars + 3 - max_len).collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        let long = "a/very/long/path/to/some/data.csv";
        let truncated = truncate_string(long, 12);
        assert_eq!(truncated.chars().count(), 12);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("data.csv"));
    }
}
