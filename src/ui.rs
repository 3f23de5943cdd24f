use colored::Colorize;
use transfer::{OutputFile, TransferResult};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Size Formatting
// ============================================================================

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Truncate a name for display, keeping the end
pub fn truncate_name(name: &str, max_len: usize) -> String {
    let count = name.chars().count();
    if count <= max_len {
        name.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let tail: String = name.chars().skip(count - (max_len - 3)).collect();
        format!("...{tail}")
    }
}

// ============================================================================
// Results
// ============================================================================

const NAME_WIDTH: usize = 48;

/// Print the summary of a finished operation.
pub fn result_summary(result: &TransferResult) {
    header("Result");
    kv("Session", &result.session_id);
    if let Some(name) = &result.file_name {
        kv("File", name);
    }
    if let Some(total) = result.total_files {
        kv("Files", &total.to_string());
    }
    if let Some(size) = result.size_bytes {
        kv("Size", &format_size(size));
    }
    if !result.output_files.is_empty() {
        println!();
        for file in &result.output_files {
            output_file(file);
        }
    }
}

fn output_file(file: &OutputFile) {
    println!(
        "  {} {} {}",
        "•".cyan(),
        truncate_name(&file.name, NAME_WIDTH),
        format_size(file.size_bytes).dimmed()
    );
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(100), "100 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_kb() {
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 100), "100.0 MB");
    }

    #[test]
    fn test_format_size_gb() {
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(
            format_size(1024 * 1024 * 1024 * 2 + 1024 * 1024 * 512),
            "2.50 GB"
        );
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short.txt", 20), "short.txt");
        assert_eq!(truncate_name("holiday-photo-0001.jpg", 12), "...-0001.jpg");
        assert_eq!(truncate_name("test", 3), "...");
        assert_eq!(truncate_name("", 10), "");
    }
}
