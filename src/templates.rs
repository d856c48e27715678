//! Template layer: Tera over the operator's and the theme's template
//! folders.
//!
//! Templates are searched in two stages. At load time the operator's
//! `templates/` folder shadows same-named theme templates; at render time
//! `custom/<name>.html` is tried before `<name>.html`. The override lookup
//! is an explicit loop over candidates rather than anything fancier;
//! template names are validated at render time, not load time, because the
//! set of reachable templates depends on content.

use crate::config::PressConfig;
use anyhow::{Result, bail};
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};

/// Value of the `global` key present in every template context.
#[derive(Serialize)]
struct Global<'a> {
    site: &'a toml::Table,
    config: &'a crate::config::SectionConfig,
}

pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load every `.html` template under the operator and theme template
    /// folders. The operator folder wins on name clashes.
    ///
    /// Missing folders load an empty engine; rendering then fails with a
    /// template-not-found error at the first render, which is the right
    /// diagnostic for a theme-less site.
    pub fn new(templates: &Path, theme_templates: &Path) -> Result<Self> {
        let mut tera = Tera::new(&format!("{}/**/*.html", templates.display()))?;
        let theme = Tera::new(&format!("{}/**/*.html", theme_templates.display()))?;
        // extend never replaces an already-loaded name
        tera.extend(&theme)?;
        // entry.content is pre-rendered trusted HTML and attached URLs must
        // reach the output verbatim; autoescaping would entity-encode both
        tera.autoescape_on(vec![]);
        Ok(Self { tera })
    }

    /// Base context carrying `global = {site, config}`.
    pub fn base_context(&self, config: &PressConfig) -> Context {
        let mut ctx = Context::new();
        ctx.insert(
            "global",
            &Global {
                site: &config.site,
                config: &config.config,
            },
        );
        ctx
    }

    /// Render `custom/<name>.html` if the operator provides it, else
    /// `<name>.html`. The `.html` suffix is appended when missing.
    pub fn render(&self, template: &str, ctx: &Context) -> Result<String> {
        let name = if template.ends_with(".html") {
            template.to_string()
        } else {
            format!("{template}.html")
        };
        let custom = format!("custom/{name}");
        for candidate in [custom.as_str(), name.as_str()] {
            if self.tera.get_template_names().any(|n| n == candidate) {
                return Ok(self.tera.render(candidate, ctx)?);
            }
        }
        bail!("Template not found: {name}")
    }
}
