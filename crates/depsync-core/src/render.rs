//! Canonical build-rule text.
//!
//! Targets render with a fixed field order (`name`, `version`, `srcs`,
//! `features`, `platforms`, `deps`), sorted lists with one item per line,
//! empty lists omitted and one blank line between targets. [`parse_targets`]
//! reads that text back so an existing managed region can be compared
//! target by target.

use std::fmt::Write as _;

use crate::synth::{TargetDescriptor, TargetKind};

const INDENT: &str = "    ";

/// Rule name emitted for a target kind.
pub fn rule_for(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Library | TargetKind::PlatformVariant => "rust_library",
        TargetKind::NativeShim => "cxx_library",
    }
}

/// A target as it appears in build-rule text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTarget {
    pub rule: String,
    pub name: String,
    pub version: Option<String>,
    pub srcs: Vec<String>,
    pub features: Vec<String>,
    pub platforms: Vec<String>,
    pub deps: Vec<String>,
}

impl RenderedTarget {
    pub fn from_descriptor(target: &TargetDescriptor) -> Self {
        let mut srcs = target.srcs.clone();
        srcs.sort();
        srcs.dedup();
        Self {
            rule: rule_for(target.kind).to_string(),
            name: target.name.clone(),
            version: Some(target.version.to_string()),
            srcs,
            features: target.features.iter().cloned().collect(),
            platforms: target.platforms.iter().map(str::to_string).collect(),
            deps: target.deps.iter().cloned().collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}(", self.rule);
        let _ = writeln!(out, "{INDENT}name = {},", quote(&self.name));
        if let Some(version) = &self.version {
            let _ = writeln!(out, "{INDENT}version = {},", quote(version));
        }
        for (key, items) in [
            ("srcs", &self.srcs),
            ("features", &self.features),
            ("platforms", &self.platforms),
            ("deps", &self.deps),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{INDENT}{key} = [");
            for item in items {
                let _ = writeln!(out, "{INDENT}{INDENT}{},", quote(item));
            }
            let _ = writeln!(out, "{INDENT}],");
        }
        out.push_str(")\n");
        out
    }
}

/// Render targets in the given order, separated by blank lines.
pub fn render_targets<'a>(targets: impl IntoIterator<Item = &'a TargetDescriptor>) -> String {
    targets
        .into_iter()
        .map(|t| RenderedTarget::from_descriptor(t).render())
        .collect::<Vec<_>>()
        .join("\n")
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Error reading rendered text back, with the 1-based line in the region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Parse the body of a managed region back into targets.
pub fn parse_targets(content: &str) -> Result<Vec<RenderedTarget>, ParseError> {
    let mut lines = content.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
    let mut targets = Vec::new();

    while let Some((line, text)) = lines.next() {
        if text.is_empty() {
            continue;
        }
        let rule = text
            .strip_suffix('(')
            .filter(|r| !r.is_empty() && r.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
            .ok_or_else(|| error(line, format!("expected a rule call, found '{text}'")))?;

        let mut target = RenderedTarget {
            rule: rule.to_string(),
            ..RenderedTarget::default()
        };
        let mut name = None;

        loop {
            let (line, text) = lines
                .next()
                .ok_or_else(|| error(line, format!("unterminated {rule}(")))?;
            if text == ")" {
                break;
            }
            let (key, value) = text
                .split_once(" = ")
                .ok_or_else(|| error(line, format!("expected 'key = value', found '{text}'")))?;

            if value == "[" {
                let items = parse_list(&mut lines, line)?;
                let slot = match key {
                    "srcs" => &mut target.srcs,
                    "features" => &mut target.features,
                    "platforms" => &mut target.platforms,
                    "deps" => &mut target.deps,
                    other => return Err(error(line, format!("unknown list field '{other}'"))),
                };
                *slot = items;
                continue;
            }

            let value = value
                .strip_suffix(',')
                .ok_or_else(|| error(line, "missing trailing comma".to_string()))?;
            let value = unquote(value).map_err(|message| error(line, message))?;
            match key {
                "name" => name = Some(value),
                "version" => target.version = Some(value),
                other => return Err(error(line, format!("unknown field '{other}'"))),
            }
        }

        target.name = name.ok_or_else(|| error(line, format!("{rule}( without a name")))?;
        targets.push(target);
    }

    Ok(targets)
}

fn parse_list<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    start: usize,
) -> Result<Vec<String>, ParseError> {
    let mut items = Vec::new();
    loop {
        let (line, text) = lines
            .next()
            .ok_or_else(|| error(start, "unterminated list".to_string()))?;
        if text == "]," {
            return Ok(items);
        }
        let item = text
            .strip_suffix(',')
            .ok_or_else(|| error(line, "missing trailing comma".to_string()))?;
        items.push(unquote(item).map_err(|message| error(line, message))?);
    }
}

fn unquote(value: &str) -> Result<String, String> {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted string, found '{value}'"))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            other => return Err(format!("invalid escape '\\{}'", other.unwrap_or(' '))),
        }
    }
    Ok(out)
}

fn error(line: usize, message: String) -> ParseError {
    ParseError { line, message }
}
