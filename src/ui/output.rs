use crate::output::is_quiet;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

/// One line counting findings per severity, e.g. `2 error, 1 warning`
pub fn severity_breakdown(severities: &[&str]) {
    if is_quiet() || severities.is_empty() {
        return;
    }
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for severity in severities {
        match counts.iter_mut().find(|(s, _)| s == severity) {
            Some((_, n)) => *n += 1,
            None => counts.push((*severity, 1)),
        }
    }
    let parts: Vec<String> = counts
        .iter()
        .map(|(severity, n)| {
            let label = if severity.is_empty() { "unrated" } else { *severity };
            format!("{} {}", n, label.style(theme().severity(severity)))
        })
        .collect();
    println!("{} {}", Icons::STATS, parts.join(", "));
}
