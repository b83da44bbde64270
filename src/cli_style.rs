use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

fn ansi(color: AnsiColor) -> Option<Color> {
    Some(Color::Ansi(color))
}

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(Style::new().bold().underline().fg_color(ansi(AnsiColor::Yellow)))
        .header(Style::new().bold().underline().fg_color(ansi(AnsiColor::Yellow)))
        .literal(Style::new().bold().fg_color(ansi(AnsiColor::Green)))
        .invalid(Style::new().bold().fg_color(ansi(AnsiColor::Red)))
        .error(Style::new().bold().fg_color(ansi(AnsiColor::Red)))
        .valid(Style::new().bold().fg_color(ansi(AnsiColor::Green)))
        .placeholder(Style::new().fg_color(ansi(AnsiColor::BrightBlack)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const AMBER: Color = Color::Rgb {
        r: 255,
        g: 191,
        b: 0,
    };
    pub const TEAL: Color = Color::Rgb {
        r: 0,
        g: 200,
        b: 180,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 80,
        g: 220,
        b: 120,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 140,
        b: 0,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 240,
        g: 240,
        b: 240,
    };
}

const H_LINE: &str = "─";
const V_LINE: &str = "│";

// ═══════════════════════════════════════════════════════════════════════════════
// Status lines
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(" {} {}", "✓".with(colors::GREEN).bold(), message.with(colors::GREEN));
}

pub fn print_error(message: &str) {
    println!(" {} {}", "✗".with(colors::RED).bold(), message.with(colors::RED));
}

pub fn print_warning(message: &str) {
    println!(" {} {}", "⚠".with(colors::ORANGE).bold(), message.with(colors::ORANGE));
}

pub fn print_section_header(title: &str) {
    let width: usize = 60;
    let left = width.saturating_sub(title.width() + 2) / 2;
    let right = width.saturating_sub(title.width() + 2 + left);
    println!();
    println!(
        "{}{} {} {}{}",
        "╭".with(colors::TEAL),
        H_LINE.repeat(left).with(colors::TEAL),
        title.with(colors::AMBER).bold().attribute(Attribute::Italic),
        H_LINE.repeat(right).with(colors::TEAL),
        "╮".with(colors::TEAL)
    );
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        "•".with(colors::TEAL),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        "○".with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tables
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: &[&str]) -> Self {
        TableBuilder {
            col_widths: headers.iter().map(|h| h.width()).collect(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (width, cell) in self.col_widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    fn border(&self, left: &str, joint: &str, right: &str) -> String {
        let segments: Vec<String> = self
            .col_widths
            .iter()
            .map(|w| H_LINE.repeat(w + 2))
            .collect();
        format!("{}{}{}", left, segments.join(joint), right)
    }

    fn line(&self, cells: &[String]) -> String {
        let padded: Vec<String> = self
            .col_widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!(" {}{} ", cell, " ".repeat(width.saturating_sub(cell.width())))
            })
            .collect();
        format!("{}{}{}", V_LINE, padded.join(V_LINE), V_LINE)
    }

    pub fn print(&self) {
        println!("{}", self.border("╭", "┬", "╮").with(colors::TEAL));
        println!("{}", self.line(&self.headers).with(colors::AMBER).bold());
        println!("{}", self.border("├", "┼", "┤").with(colors::TEAL));
        for row in &self.rows {
            println!("{}", self.line(row).with(colors::WHITE));
        }
        println!("{}", self.border("╰", "┴", "╯").with(colors::TEAL));
    }
}

pub fn get_prompt() -> String {
    format!("{} ", "♪❯".with(colors::AMBER).bold())
}

pub fn print_command_echo(command: &str) {
    println!("{}  {}", "♪❯".with(colors::AMBER).bold(), command.with(colors::GREEN));
}
