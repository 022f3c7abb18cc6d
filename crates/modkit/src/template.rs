//! Template lookup and sandboxed variable substitution.
//!
//! Templates are plain text with `${key}` placeholders. Rendering never
//! evaluates anything: a placeholder is replaced by the value bound to its
//! key, and that is all.
//!
//! # Syntax
//!
//! - `${key}` - replaced with the bound value; rendering fails if unbound
//! - `${key:-fallback}` - replaced with the bound value, or `fallback`
//! - `$$` - a literal `$`
//!
//! Keys match `[A-Za-z_][A-Za-z0-9_.]*`.

use crate::error::{Error, Result};
use crate::params::Facts;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Binding key that always holds the host's fully-qualified name
pub const FQDN_KEY: &str = "fqdn";

/// Keys callers can never override through options
pub const RESERVED_KEYS: &[&str] = &[FQDN_KEY];

/// A keyed store of raw template text.
pub trait TemplateSource: Send + Sync + fmt::Debug {
    /// Look up the raw text of a template, `None` if the id is unknown
    fn lookup(&self, id: &str) -> Result<Option<String>>;
}

/// Templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

/// Id of the template used when no content source is configured
pub const DEFAULT_TEMPLATE: &str = "svn.conf.tmpl";

const BUILTIN: &[(&str, &str)] = &[
    (DEFAULT_TEMPLATE, include_str!("../templates/svn.conf.tmpl")),
    ("spec.tmpl", include_str!("../templates/spec.tmpl")),
    ("svn/spec.tmpl", include_str!("../templates/svn/spec.tmpl")),
];

impl BuiltinTemplates {
    /// Ids of every builtin template
    pub fn ids() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(id, _)| *id)
    }
}

impl TemplateSource for BuiltinTemplates {
    fn lookup(&self, id: &str) -> Result<Option<String>> {
        Ok(BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == id)
            .map(|(_, text)| (*text).to_string()))
    }
}

/// In-memory templates, mostly for tests and embedding callers
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplates {
    templates: HashMap<String, String>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, text: &str) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: &str, text: &str) {
        self.templates.insert(id.to_string(), text.to_string());
    }
}

impl TemplateSource for MemoryTemplates {
    fn lookup(&self, id: &str) -> Result<Option<String>> {
        Ok(self.templates.get(id).cloned())
    }
}

/// Templates stored as files below a root directory.
///
/// The id is a relative path. Ids that would escape the root (absolute
/// paths, `..`) never resolve.
#[derive(Debug, Clone)]
pub struct DirTemplates {
    root: PathBuf,
}

impl DirTemplates {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if id.is_empty() || !contained {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl TemplateSource for DirTemplates {
    fn lookup(&self, id: &str) -> Result<Option<String>> {
        let Some(path) = self.path_for(id) else {
            log::debug!("Template id '{}' escapes {}", id, self.root.display());
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }
}

/// Several sources searched in order; the first hit wins
#[derive(Debug, Default)]
pub struct LayeredTemplates {
    layers: Vec<Box<dyn TemplateSource>>,
}

impl LayeredTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, source: impl TemplateSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl TemplateSource for LayeredTemplates {
    fn lookup(&self, id: &str) -> Result<Option<String>> {
        for layer in &self.layers {
            if let Some(text) = layer.lookup(id)? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

/// Variables available to a template.
///
/// Ordered so that anything derived from a set of bindings is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    /// Bindings seeded with the host identity
    pub fn for_host(facts: &Facts) -> Self {
        let mut values = BTreeMap::new();
        values.insert(FQDN_KEY.to_string(), facts.fqdn.clone());
        Self { values }
    }

    /// Merge caller options; reserved keys keep their current value
    pub fn with_options(mut self, options: &BTreeMap<String, String>) -> Self {
        for (key, value) in options {
            if RESERVED_KEYS.contains(&key.as_str()) {
                log::warn!("Ignoring option '{}': the key is reserved", key);
                continue;
            }
            self.values.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A parsed piece of template text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as-is
    Literal(String),
    /// `${name}` or `${name:-default}`
    Variable {
        name: String,
        default: Option<String>,
    },
}

/// Parse template text into segments.
///
/// Returns a message describing the first syntax error, if any.
pub fn parse(text: &str) -> std::result::Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '$')) => {
                chars.next();
                literal.push('$');
            }
            Some((_, '{')) => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(format!("unterminated placeholder at byte {offset}"));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_placeholder(&body)?);
            }
            _ => literal.push('$'),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(body: &str) -> std::result::Result<Segment, String> {
    let (name, default) = match body.split_once(":-") {
        Some((name, default)) => (name.trim(), Some(default.to_string())),
        None => (body.trim(), None),
    };
    if !is_binding_key(name) {
        return Err(format!("invalid placeholder '${{{body}}}'"));
    }
    Ok(Segment::Variable {
        name: name.to_string(),
        default,
    })
}

/// Whether `key` can be referenced from a template
pub fn is_binding_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Substitute bindings into template text.
///
/// `id` only labels errors.
pub fn render_str(id: &str, text: &str, bindings: &Bindings) -> Result<String> {
    let segments = parse(text).map_err(|message| Error::render(id, message))?;
    let mut out = String::with_capacity(text.len());

    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Variable { name, default } => match (bindings.get(&name), default) {
                (Some(value), _) => out.push_str(value),
                (None, Some(default)) => out.push_str(&default),
                (None, None) => {
                    return Err(Error::render(id, format!("missing binding '{name}'")));
                }
            },
        }
    }

    Ok(out)
}

/// Resolves template ids against a source and renders them
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    source: &'a dyn TemplateSource,
}

impl<'a> Renderer<'a> {
    pub fn new(source: &'a dyn TemplateSource) -> Self {
        Self { source }
    }

    /// Render the template `id` with `bindings`
    pub fn render(&self, id: &str, bindings: &Bindings) -> Result<String> {
        let text = self
            .source
            .lookup(id)?
            .ok_or_else(|| Error::TemplateNotFound { id: id.to_string() })?;
        log::debug!("Rendering template '{}' with {} bindings", id, bindings.len());
        render_str(id, &text, bindings)
    }
}
