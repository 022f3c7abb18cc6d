//! # modkit
//!
//! Compiles module parameters into resource declarations.
//!
//! A pass has three steps, all pure:
//!
//! 1. [`resolve`] validates [`ModuleParams`] and applies precedence rules
//!    (`my_class` > `template` > `source` > default template; `absent`
//!    overrides everything).
//! 2. [`build`] turns the [`ResolvedParams`] into an ordered [`Plan`]:
//!    package, configuration file, then the optional directory.
//! 3. Content that must be generated is rendered by the [`Renderer`] from a
//!    [`TemplateSource`] using sandboxed `${key}` substitution.
//!
//! Applying the plan to a host is somebody else's job.
//!
//! ## Example
//!
//! ```
//! use modkit::{BuiltinTemplates, Facts, ModuleParams, TargetState, compile};
//!
//! let params = ModuleParams {
//!     version: "1.0.42".into(),
//!     ..Default::default()
//! };
//! let plan = compile(&params, &Facts::new("node.example.com"), &BuiltinTemplates)?;
//!
//! assert_eq!(plan.package().unwrap().target, TargetState::Version("1.0.42".into()));
//! # Ok::<(), modkit::Error>(())
//! ```

pub mod error;
pub mod params;
pub mod plan;
pub mod resolver;
pub mod template;

pub use error::{Error, Result};
pub use params::{Facts, ModuleParams};
pub use plan::{Content, Plan, ResourceDeclaration, ResourceKind, bindings_for, build};
pub use resolver::{ContentSource, ResolvedDirectory, ResolvedParams, TargetState, resolve};
pub use template::{
    Bindings, BuiltinTemplates, DirTemplates, LayeredTemplates, MemoryTemplates, Renderer,
    TemplateSource,
};

/// Resolve `params` and build the plan in one step.
pub fn compile(
    params: &ModuleParams,
    facts: &Facts,
    templates: &dyn TemplateSource,
) -> Result<Plan> {
    let resolved = resolve(params)?;
    build(&resolved, facts, templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const NODE: &str = "rspec.example42.com";

    fn compile_json(json: &str) -> Result<Plan> {
        let params: ModuleParams = serde_json::from_str(json).unwrap();
        compile(&params, &Facts::new(NODE), &BuiltinTemplates)
    }

    #[test]
    fn minimal_installation() {
        let plan = compile_json("{}").unwrap();
        let package = plan.package().unwrap();
        assert_eq!(package.title, "subversion");
        assert_eq!(package.target, TargetState::Present);

        let file = plan.file().unwrap();
        assert_eq!(file.title, "svn.conf");
        assert_eq!(file.target, TargetState::Present);
        assert!(file.content.inline().unwrap().contains(NODE));
    }

    #[test]
    fn specific_version() {
        let plan = compile_json(r#"{"version": "1.0.42"}"#).unwrap();
        assert_eq!(plan.package().unwrap().target.to_string(), "1.0.42");
    }

    #[test]
    fn decommissioning() {
        let plan = compile_json(r#"{"absent": true}"#).unwrap();
        assert_eq!(plan.package().unwrap().target, TargetState::Absent);
        assert_eq!(plan.file().unwrap().target, TargetState::Absent);
    }

    #[test]
    fn absent_wins_over_every_content_option() {
        let plan = compile_json(
            r#"{"absent": true, "version": "2.0", "template": "spec.tmpl",
                "source": "/srv/svn.conf", "source_dir": "/srv/svn", "source_dir_purge": true}"#,
        )
        .unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|d| d.target.is_absent()));
    }

    #[test]
    fn noop_only_flips_noop_flags() {
        let base = r#""template": "spec.tmpl", "options": {"opt_a": "value_a"}, "source_dir": "loc""#;
        let applied = compile_json(&format!("{{{base}}}")).unwrap();
        let noop = compile_json(&format!(r#"{{{base}, "noop": true}}"#)).unwrap();

        assert!(applied.iter().all(|d| !d.noop));
        assert!(noop.iter().all(|d| d.noop));

        let flipped: Vec<_> = noop
            .into_iter()
            .map(|mut d| {
                d.noop = false;
                d
            })
            .collect();
        assert_eq!(flipped, applied.declarations);
    }

    #[test]
    fn template_with_options() {
        let plan = compile_json(r#"{"template": "spec.tmpl", "options": {"opt_a": "value_a"}}"#)
            .unwrap();
        let content = plan.file().unwrap().content.inline().unwrap();
        assert!(content.contains("fqdn: rspec.example42.com"));
        assert!(content.contains("value_a"));
    }

    #[test]
    fn template_requiring_missing_option_fails() {
        let err = compile_json(r#"{"template": "spec.tmpl"}"#).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn static_source() {
        let plan = compile_json(r#"{"source": "/srv/modules/svn/spec"}"#).unwrap();
        assert_eq!(
            plan.file().unwrap().content,
            Content::Source("/srv/modules/svn/spec".into())
        );
    }

    #[test]
    fn template_beats_source() {
        let plan = compile_json(
            r#"{"template": "spec.tmpl", "source": "/srv/svn.conf", "options": {"opt_a": "x"}}"#,
        )
        .unwrap();
        let file = plan.file().unwrap();
        assert!(file.content.inline().is_some());
        assert_eq!(file.content.source(), None);
    }

    #[test]
    fn source_dir_with_purge() {
        let plan = compile_json(r#"{"source_dir": "loc", "source_dir_purge": true}"#).unwrap();
        let dir = plan.directory().unwrap();
        assert_eq!(dir.content, Content::Source("loc".into()));
        assert!(dir.purge);
        assert!(dir.force);
    }

    #[test]
    fn source_dir_without_purge() {
        let plan = compile_json(r#"{"source_dir": "loc"}"#).unwrap();
        let dir = plan.directory().unwrap();
        assert!(!dir.purge);
        assert!(!dir.force);
    }

    #[test]
    fn custom_class() {
        let plan = compile_json(r#"{"my_class": "svn::spec"}"#).unwrap();
        assert!(plan.file().unwrap().content.inline().unwrap().contains(NODE));
    }

    #[test]
    fn unknown_custom_class_fails() {
        let err = compile_json(r#"{"my_class": "svn::nothing"}"#).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { ref id } if id == "svn/nothing.tmpl"));
    }

    #[test]
    fn compilation_is_repeatable() {
        let params = ModuleParams {
            template: Some("spec.tmpl".into()),
            options: BTreeMap::from([("opt_a".into(), "value_a".into())]),
            ..Default::default()
        };
        let facts = Facts::new(NODE);
        let first = compile(&params, &facts, &BuiltinTemplates).unwrap();
        let second = compile(&params, &facts, &BuiltinTemplates).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn passes_run_in_parallel() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let params = ModuleParams {
                        version: format!("1.0.{i}"),
                        ..Default::default()
                    };
                    compile(&params, &Facts::new(NODE), &BuiltinTemplates).unwrap()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let plan = handle.join().unwrap();
            assert_eq!(plan.package().unwrap().target.to_string(), format!("1.0.{i}"));
        }
    }
}
