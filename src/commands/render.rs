//! `svnmod render`

use anyhow::{Context as _, Result};
use modkit::template::DEFAULT_TEMPLATE;
use modkit::{Bindings, Facts, Renderer, ResolvedParams, bindings_for};

use super::Session;
use crate::cli::GlobalArgs;

/// Print one template rendered with the bindings a plan would give it
pub fn run(global: &GlobalArgs, template: &str) -> Result<()> {
    let session = Session::load(global)?;
    let resolved = session.resolve()?;
    let bindings = bindings_for_template(&resolved, &session.facts, template);

    let text = Renderer::new(&session.templates)
        .render(template, &bindings)
        .with_context(|| format!("Could not render {template}"))?;
    print!("{text}");
    Ok(())
}

/// The default template sees the module bindings, any other the options
fn bindings_for_template(resolved: &ResolvedParams, facts: &Facts, template: &str) -> Bindings {
    if template == DEFAULT_TEMPLATE {
        let mut default = resolved.clone();
        default.content = Some(modkit::ContentSource::Default);
        bindings_for(&default, facts)
    } else {
        Bindings::for_host(facts).with_options(&resolved.options)
    }
}
