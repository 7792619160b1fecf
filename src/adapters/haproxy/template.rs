use std::fmt::Write;
use std::path::Path;

use crate::core::entities::{BackendPool, Listener};
use crate::ports::config_renderer::{RenderError, RenderResult};

pub const FRONTENDS_PLACEHOLDER: &str = "{{frontends}}";
pub const BACKENDS_PLACEHOLDER: &str = "{{backends}}";

/// Health-check suffix appended to every server line.
pub const SERVER_CHECK: &str = "check inter 2000";

pub const DEFAULT_TEMPLATE: &str = "global
  maxconn 256

  defaults
    timeout connect 5000ms

{{frontends}}
{{backends}}
";

/// Generation template for the haproxy config file.
///
/// The template is plain text holding the `{{frontends}}` and `{{backends}}`
/// placeholders; each is replaced by one section per entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    source: String,
}

impl ConfigTemplate {
    pub fn new(source: impl Into<String>) -> RenderResult<Self> {
        let source = source.into();
        for placeholder in [FRONTENDS_PLACEHOLDER, BACKENDS_PLACEHOLDER] {
            if !source.contains(placeholder) {
                return Err(RenderError::Template(format!(
                    "missing placeholder {placeholder}"
                )));
            }
        }
        Ok(Self { source })
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let source = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::new(source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the complete configuration text. Output depends only on the inputs.
    pub fn render(&self, listeners: &[Listener], pools: &[BackendPool]) -> String {
        let mut frontends = String::new();
        for listener in listeners {
            write_frontend(&mut frontends, listener);
        }

        let mut backends = String::new();
        for pool in pools {
            write_backend(&mut backends, pool);
        }

        // Single pass over the template so rendered entity text is never rescanned
        let sections = [
            (FRONTENDS_PLACEHOLDER, frontends.as_str()),
            (BACKENDS_PLACEHOLDER, backends.as_str()),
        ];
        let mut out = String::with_capacity(self.source.len() + frontends.len() + backends.len());
        let mut rest = self.source.as_str();
        loop {
            let next = sections
                .iter()
                .filter_map(|(placeholder, text)| rest.find(placeholder).map(|at| (at, *placeholder, *text)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, placeholder, text)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(text);
                    rest = &rest[at + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

impl Default for ConfigTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

fn write_directive(out: &mut String, directive: &str, value: &str) {
    if !value.is_empty() {
        let _ = writeln!(out, "    {directive} {value}");
    }
}

fn write_frontend(out: &mut String, listener: &Listener) {
    let _ = writeln!(out, "  frontend {}", listener.name);
    write_directive(out, "bind", &listener.bind);
    write_directive(out, "mode", &listener.mode);
    write_directive(out, "default_backend", &listener.default_backend);
    write_directive(out, "option", &listener.option);
    for line in listener.rules.iter().flat_map(|rule| rule.lines()) {
        let line = line.trim();
        // a blank line would end the section
        if !line.is_empty() {
            let _ = writeln!(out, "    {line}");
        }
    }
    out.push('\n');
}

fn write_backend(out: &mut String, pool: &BackendPool) {
    let _ = writeln!(out, "  backend {}", pool.name);
    write_directive(out, "mode", &pool.mode);
    write_directive(out, "balance", &pool.balance);
    for member in &pool.members {
        let _ = writeln!(
            out,
            "    server {} {}:{} {SERVER_CHECK}",
            member.name, member.host, member.port
        );
    }
    out.push('\n');
}
