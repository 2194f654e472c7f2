//! Text templates with `$name` placeholders.
//!
//! Placeholders are written `$name` or `${name}` where `name` matches
//! `[A-Za-z_][A-Za-z0-9_]*`; `$$` produces a literal `$`. Any other `$` is
//! kept as plain text. Rendering never mutates a template: partial
//! rendering keeps unknown placeholders verbatim so a half-filled result can
//! be bound again later, strict rendering requires every placeholder.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::core::{Error, Result};

/// File-name suffix of template files in a template directory.
pub const TEMPLATE_SUFFIX: &str = "_template";

/// Placeholder name to replacement text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bindings {
    values: HashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for (name, value) in iter {
            bindings.set(name, value);
        }
        bindings
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder { name: String, braced: bool },
}

/// Parsed, immutable template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let segments = parse_segments(&source);
        Self { name: name.into(), source, segments }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { name, .. } = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute bound placeholders; unbound ones are left as written.
    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder { name, braced } => match bindings.get(name) {
                    Some(value) => out.push_str(value),
                    None if *braced => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                    None => {
                        out.push('$');
                        out.push_str(name);
                    }
                },
            }
        }
        out
    }

    /// Substitute every placeholder, failing on the first unbound one.
    pub fn render_strict(&self, bindings: &Bindings) -> Result<String> {
        if let Some(missing) = self.placeholders().into_iter().find(|n| bindings.get(n).is_none()) {
            return Err(Error::UnboundPlaceholder {
                template: self.name.clone(),
                name: missing.to_string(),
            });
        }
        Ok(self.render(bindings))
    }

    /// Partially render and treat the result as a new template.
    ///
    /// Bound values are re-scanned, so placeholders they contain become
    /// placeholders of the returned template.
    pub fn bind(&self, bindings: &Bindings) -> Template {
        Template::parse(self.name.clone(), self.render(bindings))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_segments(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = source;

    while let Some(pos) = rest.find('$') {
        text.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            text.push('$');
            rest = tail;
            continue;
        }

        let placeholder = if let Some(inner) = after.strip_prefix('{') {
            inner.find('}').and_then(|end| {
                let name = &inner[..end];
                let valid = name.chars().next().is_some_and(is_ident_start)
                    && name.chars().all(is_ident_char);
                valid.then(|| (name, true, &inner[end + 1..]))
            })
        } else if after.chars().next().is_some_and(is_ident_start) {
            let end = after.find(|c: char| !is_ident_char(c)).unwrap_or(after.len());
            Some((&after[..end], false, &after[end..]))
        } else {
            None
        };

        match placeholder {
            Some((name, braced, tail)) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Placeholder { name: name.to_string(), braced });
                rest = tail;
            }
            None => {
                text.push('$');
                rest = after;
            }
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Named templates loaded once per run.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// World and include templates for Gazebo worlds.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.insert(Template::parse(
            "world_template",
            include_str!("../../templates/world_template"),
        ));
        set.insert(Template::parse(
            "include_template",
            include_str!("../../templates/include_template"),
        ));
        set
    }

    /// Load every `*_template` file in `dir`, keyed by file name.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut set = Self::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.ends_with(TEMPLATE_SUFFIX) || !entry.file_type()?.is_file() {
                continue;
            }
            let source = fs::read_to_string(entry.path())?;
            set.insert(Template::parse(name, source));
        }
        log::debug!("Loaded {} templates from {}", set.templates.len(), dir.display());
        Ok(set)
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| Error::TemplateMissing(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_and_braced_placeholders() {
        let t = Template::parse("t", "<uri>model://${model}</uri><name>$name</name>");
        let out = t.render(&Bindings::new().with("model", "olive3").with("name", "olive12"));
        assert_eq!(out, "<uri>model://olive3</uri><name>olive12</name>");
        assert_eq!(t.placeholders(), vec!["model", "name"]);
    }

    #[test]
    fn test_partial_render_keeps_unknown() {
        let t = Template::parse("t", "a=$a b=${b} c=$c_1 $a");
        let out = t.render(&Bindings::new().with("a", "1"));
        assert_eq!(out, "a=1 b=${b} c=$c_1 1");
    }

    #[test]
    fn test_dollar_escapes_and_literals() {
        let t = Template::parse("t", "cost: $$5, $ alone, $9, ${not closed, ${bad-name}");
        assert!(t.placeholders().is_empty());
        assert_eq!(
            t.render(&Bindings::new()),
            "cost: $5, $ alone, $9, ${not closed, ${bad-name}"
        );
    }

    #[test]
    fn test_identifier_boundary() {
        let t = Template::parse("t", "$pose.x $pose_1");
        let out = t.render(&Bindings::new().with("pose", "P").with("pose_1", "Q"));
        assert_eq!(out, "P.x Q");
    }

    #[test]
    fn test_strict_reports_missing() {
        let t = Template::parse("include_template", "$name $pose");
        let err = t.render_strict(&Bindings::new().with("name", "x")).unwrap_err();
        match err {
            Error::UnboundPlaceholder { template, name } => {
                assert_eq!(template, "include_template");
                assert_eq!(name, "pose");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_render_is_idempotent() {
        let t = Template::parse("t", "<pose>$pose</pose>");
        let bindings = Bindings::new().with("pose", "1 2 3 0 0 0.5");
        let once = t.render_strict(&bindings).unwrap();
        let twice = Template::parse("t", once.clone()).render_strict(&bindings).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_render_does_not_mutate_blueprint() {
        let t = Template::parse("t", "[$x]");
        let _ = t.render(&Bindings::new().with("x", "1"));
        assert_eq!(t.render(&Bindings::new().with("x", "2")), "[2]");
        assert_eq!(t.source(), "[$x]");
    }

    #[test]
    fn test_staged_binding() {
        let outer = Template::parse("world", "<world>$include</world>");
        let staged = outer.bind(&Bindings::new().with("include", "<a/>$include"));
        let staged = staged.bind(&Bindings::new().with("include", "<b/>$include"));
        let done = staged.render_strict(&Bindings::new().with("include", "")).unwrap();
        assert_eq!(done, "<world><a/><b/></world>");
    }

    #[test]
    fn test_builtin_set() {
        let set = TemplateSet::builtin();
        assert!(set.contains("world_template"));
        assert!(set.get("include_template").unwrap().placeholders().contains(&"pose"));
        assert!(matches!(set.get("model_sdf_template"), Err(Error::TemplateMissing(_))));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("world_template"), "<w>$include</w>").unwrap();
        fs::write(dir.path().join("include_template"), "<i>$name</i>$include").unwrap();
        fs::write(dir.path().join("README.md"), "not a template").unwrap();

        let set = TemplateSet::load_dir(dir.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("world_template").unwrap().source(), "<w>$include</w>");
        assert!(!set.contains("README.md"));
    }
}
