//! Template engine based on MiniJinja

use minijinja::{Environment, UndefinedBehavior};
use tracing::trace;

use kubecrt_core::{LoadedChart, ManifestStream, TemplateContext};

use crate::error::{Result, TemplateError};
use crate::filters;
use crate::functions;
use crate::partials::{Partials, template_name};

/// Filters registered on top of the MiniJinja builtins
pub const FILTERS: &[&str] = &[
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "indent",
    "nindent",
    "required",
    "trunc",
    "trimprefix",
    "trimsuffix",
    "sha256",
];

/// Global functions registered on top of the MiniJinja builtins
pub const FUNCTIONS: &[&str] = &["fail", "dict", "list", "coalesce", "ternary"];

/// The template engine
///
/// Undefined values are errors and output is never HTML-escaped.
#[derive(Debug, Clone, Default)]
pub struct Engine;

impl Engine {
    /// Create a configured MiniJinja environment
    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // Manifests are YAML: never HTML-escape.
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("required", filters::required);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);
        env.add_filter("sha256", filters::sha256sum);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("list", functions::list);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);

        env
    }

    fn context_value(context: &TemplateContext) -> minijinja::Value {
        minijinja::context! {
            values => &context.values,
            release => &context.release,
            chart => &context.chart,
            capabilities => &context.capabilities,
        }
    }

    /// Render a chart into a manifest stream
    ///
    /// CRDs come first, verbatim, then every non-helper template in path
    /// order. Each non-empty document carries a `# Source:` comment.
    pub fn render_chart(
        &self,
        chart: &LoadedChart,
        context: &TemplateContext,
        partials: &Partials,
    ) -> Result<ManifestStream> {
        let chart_name = &chart.metadata.name;
        let mut stream = ManifestStream::new();

        if let Some(crds_dir) = &chart.crds_dir {
            for path in chart.crd_files()? {
                let content = std::fs::read_to_string(&path)?;
                let name = template_name(&path, crds_dir);
                push_source(&mut stream, &format!("{chart_name}/crds/{name}"), &content);
            }
        }

        let mut env = self.create_environment();
        let mut sources = Vec::new();

        for (name, source) in partials.iter() {
            env.add_template_owned(name.to_string(), source.to_string())
                .map_err(|e| TemplateError::from_minijinja(&e, name, source))?;
        }

        // Chart templates shadow partials of the same name.
        for path in chart.template_files()? {
            let name = template_name(&path, &chart.templates_dir);
            let source = std::fs::read_to_string(&path)?;
            env.add_template_owned(name.clone(), source.clone())
                .map_err(|e| TemplateError::from_minijinja(&e, &name, &source))?;
            sources.push((name, source));
        }

        let ctx = Self::context_value(context);

        for (name, source) in &sources {
            if !is_emitted(name) {
                continue;
            }

            trace!(chart = %chart_name, template = %name, "rendering template");
            let rendered = env
                .get_template(name)
                .and_then(|tmpl| tmpl.render(&ctx))
                .map_err(|e| TemplateError::from_minijinja(&e, name, source))?;

            let output_name = output_name(name);
            push_source(
                &mut stream,
                &format!("{chart_name}/templates/{output_name}"),
                &rendered,
            );
        }

        Ok(stream)
    }
}

/// Template name without its Jinja suffix (`.j2`, `.jinja2`), removed once
fn output_name(name: &str) -> &str {
    name.strip_suffix(".j2")
        .or_else(|| name.strip_suffix(".jinja2"))
        .unwrap_or(name)
}

/// Helpers (`_*`) and `NOTES.txt` are loaded but produce no output
fn is_emitted(name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    !file_name.starts_with('_') && !file_name.eq_ignore_ascii_case("NOTES.txt")
}

/// Append `content` under a `# Source:` comment, unless it renders to nothing
fn push_source(stream: &mut ManifestStream, source: &str, content: &str) {
    let body = strip_leading_separator(content).trim_end();
    if body.trim().is_empty() {
        return;
    }
    stream.push_document(&format!("# Source: {source}\n{body}"));
}

fn strip_leading_separator(content: &str) -> &str {
    let trimmed = content.trim_start();
    match trimmed.strip_prefix("---") {
        Some(rest) if rest.starts_with('\n') || rest.starts_with("\r\n") => {
            rest.trim_start_matches(['\r', '\n'])
        }
        Some("") => "",
        _ => content,
    }
}
