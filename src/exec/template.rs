// src/exec/template.rs

//! `{}` / `{0}` / `{name}` substitution for command strings.
//!
//! `{{` and `}}` produce literal braces and shell parameter expansions such
//! as `${VIRTUAL_ENV}` are left for the shell. Referencing an index or key that
//! was not supplied is an error rather than a silent empty string, so a
//! typo in a configured command never runs a half-formed shell line.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::{Result, StagehandError};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{[^}]*\}|\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*|[0-9]+)?\}")
        .unwrap_or_else(|e| unreachable!("placeholder regex is valid: {e}"))
});

/// Positional and keyword arguments for [`render`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateArgs {
    positional: Vec<String>,
    named: BTreeMap<String, String>,
}

impl TemplateArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }
}

pub fn render(template: &str, args: &TemplateArgs) -> Result<String> {
    let mut next_auto = 0usize;
    let mut missing: Option<String> = None;

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let whole = &caps[0];
        if whole.starts_with('$') {
            return whole.to_string();
        }
        if whole == "{{" {
            return "{".to_string();
        }
        if whole == "}}" {
            return "}".to_string();
        }

        let value = match caps.get(1).map(|m| m.as_str()) {
            None => {
                let idx = next_auto;
                next_auto += 1;
                args.positional.get(idx)
            }
            Some(key) => match key.parse::<usize>() {
                Ok(idx) => args.positional.get(idx),
                Err(_) => args.named.get(key),
            },
        };

        match value {
            Some(v) => v.clone(),
            None => {
                missing.get_or_insert_with(|| whole.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(placeholder) => Err(StagehandError::TemplateError(format!(
            "no value for placeholder {placeholder} in '{template}'"
        ))),
        None => Ok(rendered.into_owned()),
    }
}
