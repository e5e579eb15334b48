//! Node construction over the YAML event stream
//!
//! [`NodeBuilder`] folds the marked events of `yaml_rust2` into [`Value`]
//! trees. This is where the preprocessor's custom semantics live: implicit
//! scalar resolution with the narrowed boolean set, variable interpolation
//! with post-substitution reclassification, single-quote suppression, the
//! `!include` and `!secret` tags, and anchor/alias support.
//!
//! Scalar construction dispatches through a [`ConstructorRegistry`] keyed
//! by resolved tag, so the same lookup serves explicit `!!` tags and the
//! reclassification of substituted scalars.

use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::warn;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Tag as YamlTag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::error::{Error, Result};
use crate::interpolation::{self, VarEnv};
use crate::scalar::{self, Tag};
use crate::value::{IncludeRef, SecretRef, Value};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";
const INCLUDE_TAG: &str = "include";
const SECRET_TAG: &str = "secret";

/// A scalar constructor: turns raw scalar text into a typed [`Value`].
pub trait ScalarConstruct {
    /// Construct the value for an already-classified scalar.
    fn construct(&self, raw: &str) -> Result<Value>;
}

struct ConstructNull;
struct ConstructBool;
struct ConstructInt;
struct ConstructFloat;
struct ConstructTimestamp;
struct ConstructStr;

impl ScalarConstruct for ConstructNull {
    // Null scalars become empty strings so their keys survive in the
    // output mapping.
    fn construct(&self, _raw: &str) -> Result<Value> {
        Ok(Value::String(String::new()))
    }
}

impl ScalarConstruct for ConstructBool {
    fn construct(&self, raw: &str) -> Result<Value> {
        Ok(Value::Bool(raw.eq_ignore_ascii_case("true")))
    }
}

impl ScalarConstruct for ConstructInt {
    fn construct(&self, raw: &str) -> Result<Value> {
        // Overflow falls back to the raw text
        Ok(scalar::parse_int(raw)
            .map(Value::Integer)
            .unwrap_or_else(|| Value::String(raw.to_string())))
    }
}

impl ScalarConstruct for ConstructFloat {
    fn construct(&self, raw: &str) -> Result<Value> {
        Ok(scalar::parse_float(raw)
            .map(Value::Float)
            .unwrap_or_else(|| Value::String(raw.to_string())))
    }
}

impl ScalarConstruct for ConstructTimestamp {
    fn construct(&self, raw: &str) -> Result<Value> {
        // A pattern match that is not a real calendar date stays a string
        Ok(scalar::parse_timestamp(raw)
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::String(raw.to_string())))
    }
}

impl ScalarConstruct for ConstructStr {
    fn construct(&self, raw: &str) -> Result<Value> {
        Ok(Value::String(raw.to_string()))
    }
}

/// Registry of scalar constructors keyed by resolved tag.
pub struct ConstructorRegistry {
    constructors: HashMap<Tag, Box<dyn ScalarConstruct>>,
}

impl Default for ConstructorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ConstructorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create a registry with constructors for every core tag
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Tag::Null, Box::new(ConstructNull));
        registry.register(Tag::Bool, Box::new(ConstructBool));
        registry.register(Tag::Int, Box::new(ConstructInt));
        registry.register(Tag::Float, Box::new(ConstructFloat));
        registry.register(Tag::Timestamp, Box::new(ConstructTimestamp));
        registry.register(Tag::Str, Box::new(ConstructStr));
        registry
    }

    /// Register a constructor for a tag, replacing any existing one
    pub fn register(&mut self, tag: Tag, constructor: Box<dyn ScalarConstruct>) {
        self.constructors.insert(tag, constructor);
    }

    /// Construct a value for a scalar with the given resolved tag
    pub fn construct(&self, tag: Tag, raw: &str) -> Result<Value> {
        self.constructors
            .get(&tag)
            .ok_or_else(|| Error::constructor_not_found(tag.to_string()))?
            .construct(raw)
    }

    /// Construct a value for a substituted scalar, reporting the original
    /// text when the new tag has no constructor
    fn construct_substituted(&self, tag: Tag, substituted: &str, original: &str) -> Result<Value> {
        self.constructors
            .get(&tag)
            .ok_or_else(|| {
                Error::constructor_not_found_for_substitution(original, substituted, tag.to_string())
            })?
            .construct(substituted)
    }
}

/// A node under construction.
enum BuildNode {
    Sequence {
        aid: usize,
        tag: Option<YamlTag>,
        items: Vec<Value>,
    },
    Mapping {
        aid: usize,
        tag: Option<YamlTag>,
        entries: Vec<(Value, Option<Value>)>,
    },
}

/// Event receiver that builds a [`Value`] tree bound to a variable
/// environment.
pub(crate) struct NodeBuilder<'a> {
    env: &'a VarEnv,
    registry: &'a ConstructorRegistry,
    stack: Vec<BuildNode>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
    error: Option<Error>,
}

impl<'a> NodeBuilder<'a> {
    pub(crate) fn new(env: &'a VarEnv, registry: &'a ConstructorRegistry) -> Self {
        Self {
            env,
            registry,
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
            error: None,
        }
    }

    /// Finish the build, returning the root value. An empty document
    /// yields `Value::Null`.
    pub(crate) fn into_value(self) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(self.root.unwrap_or(Value::Null))
    }

    fn process(&mut self, ev: Event, mark: Marker) -> Result<()> {
        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}

            Event::Scalar(value, style, aid, tag) => {
                let node = self.construct_scalar(value, style, tag.as_ref(), mark)?;
                self.complete(aid, node);
            }

            Event::SequenceStart(aid, tag) => {
                self.stack.push(BuildNode::Sequence {
                    aid,
                    tag,
                    items: Vec::new(),
                });
            }

            Event::SequenceEnd => {
                let Some(BuildNode::Sequence { aid, tag, items }) = self.stack.pop() else {
                    return Err(Error::structure("sequence end without a sequence start"));
                };
                let node = self.finish_sequence(items, tag.as_ref())?;
                self.complete(aid, node);
            }

            Event::MappingStart(aid, tag) => {
                self.stack.push(BuildNode::Mapping {
                    aid,
                    tag,
                    entries: Vec::new(),
                });
            }

            Event::MappingEnd => {
                let Some(BuildNode::Mapping { aid, tag, entries }) = self.stack.pop() else {
                    return Err(Error::structure("mapping end without a mapping start"));
                };
                let node = self.finish_mapping(entries, tag.as_ref())?;
                self.complete(aid, node);
            }

            Event::Alias(id) => {
                let node = self.anchors.get(&id).cloned().ok_or_else(|| {
                    Error::structure(format!(
                        "alias at line {} refers to an unknown anchor",
                        mark.line() + 1
                    ))
                })?;
                self.complete(0, node);
            }
        }
        Ok(())
    }

    /// Record an anchored node and attach it to its parent, or make it the
    /// root. Valid anchor ids start at 1.
    fn complete(&mut self, aid: usize, node: Value) {
        if aid > 0 {
            self.anchors.insert(aid, node.clone());
        }

        let Some(parent) = self.stack.last_mut() else {
            self.root = Some(node);
            return;
        };

        match parent {
            BuildNode::Sequence { items, .. } => items.push(node),
            BuildNode::Mapping { entries, .. } => match entries.last_mut() {
                Some((_, slot @ None)) => *slot = Some(node),
                _ => entries.push((node, None)),
            },
        }
    }

    fn construct_scalar(
        &self,
        value: String,
        style: TScalarStyle,
        tag: Option<&YamlTag>,
        mark: Marker,
    ) -> Result<Value> {
        if let Some(tag) = tag {
            if is_local(tag) {
                return match tag.suffix.as_str() {
                    INCLUDE_TAG => Ok(Value::IncludeRef(IncludeRef {
                        file_name: value.trim().to_string(),
                        vars: self.env.clone(),
                    })),
                    SECRET_TAG => Ok(Value::SecretRef(SecretRef {
                        name: value.trim().to_string(),
                    })),
                    other => Err(Error::constructor_not_found(format!("!{}", other))),
                };
            }
            if is_core(tag) {
                return match tag.suffix.as_str() {
                    "str" => self.construct_string(value, style),
                    "null" => self.registry.construct(Tag::Null, &value),
                    "bool" => self.registry.construct(Tag::Bool, &value),
                    "int" => self.registry.construct(Tag::Int, &value),
                    "float" => self.registry.construct(Tag::Float, &value),
                    "timestamp" => self.registry.construct(Tag::Timestamp, &value),
                    other => Err(Error::constructor_not_found(format!("!!{}", other))),
                };
            }
            return Err(Error::constructor_not_found(format!(
                "{}{} (line {})",
                tag.handle,
                tag.suffix,
                mark.line() + 1
            )));
        }

        match style {
            TScalarStyle::SingleQuoted => Ok(Value::String(value)),
            TScalarStyle::Plain => match scalar::resolve(&value) {
                Tag::Str => self.construct_interpolated(value),
                tag => self.registry.construct(tag, &value),
            },
            _ => self.construct_interpolated(value),
        }
    }

    /// Explicit `!!str` keeps quoting semantics: single-quoted text is
    /// verbatim, everything else is interpolated.
    fn construct_string(&self, value: String, style: TScalarStyle) -> Result<Value> {
        if style == TScalarStyle::SingleQuoted {
            Ok(Value::String(value))
        } else {
            self.construct_interpolated(value)
        }
    }

    /// Interpolate a string-classified scalar. Without a substitution site
    /// the text is kept verbatim; after a substitution the result is
    /// reclassified and constructed under its new tag, so `${n}` with
    /// n=42 yields an integer.
    fn construct_interpolated(&self, value: String) -> Result<Value> {
        match interpolation::interpolate(&value, self.env)? {
            None => Ok(Value::String(value)),
            Some(substituted) => {
                let tag = scalar::resolve(&substituted);
                self.registry.construct_substituted(tag, &substituted, &value)
            }
        }
    }

    fn finish_sequence(&self, items: Vec<Value>, tag: Option<&YamlTag>) -> Result<Value> {
        if let Some(tag) = tag {
            if is_local(tag) && tag.suffix == INCLUDE_TAG {
                warn!("invalid !include argument: expected a scalar or a mapping, got a sequence");
                return Ok(Value::Mapping(IndexMap::new()));
            }
            if is_local(tag) && tag.suffix == SECRET_TAG {
                return Err(Error::structure("!secret requires a scalar node"));
            }
            if !(is_core(tag) && tag.suffix == "seq") {
                return Err(Error::constructor_not_found(format!(
                    "{}{}",
                    tag.handle, tag.suffix
                )));
            }
        }
        Ok(Value::Sequence(items))
    }

    fn finish_mapping(
        &self,
        entries: Vec<(Value, Option<Value>)>,
        tag: Option<&YamlTag>,
    ) -> Result<Value> {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(value) = value else {
                return Err(Error::structure("mapping entry without a value"));
            };
            match key.scalar_string() {
                Some(key) => {
                    map.insert(key, value);
                }
                None => warn!(
                    "skipping mapping entry with a {} key, expected a scalar",
                    key.type_name()
                ),
            }
        }

        if let Some(tag) = tag {
            if is_local(tag) && tag.suffix == INCLUDE_TAG {
                return Ok(self.finish_include(map));
            }
            if is_local(tag) && tag.suffix == SECRET_TAG {
                return Err(Error::structure("!secret requires a scalar node"));
            }
            if !(is_core(tag) && tag.suffix == "map") {
                return Err(Error::constructor_not_found(format!(
                    "{}{}",
                    tag.handle, tag.suffix
                )));
            }
        }
        Ok(Value::Mapping(map))
    }

    /// Build an [`IncludeRef`] from a `!include {file: ..., vars: {...}}`
    /// mapping. A missing or non-string `file` degrades to an empty
    /// mapping; malformed `vars` entries are skipped.
    fn finish_include(&self, map: IndexMap<String, Value>) -> Value {
        let file_name = match map.get("file") {
            Some(Value::String(name)) => name.clone(),
            _ => {
                warn!("missing 'file' key in !include mapping");
                return Value::Mapping(IndexMap::new());
            }
        };

        let mut vars = self.env.clone();
        match map.get("vars") {
            None => {}
            Some(Value::Mapping(overrides)) => {
                for (name, value) in overrides {
                    match value.scalar_string() {
                        Some(value) => {
                            vars.insert(name.clone(), value);
                        }
                        None => warn!(
                            "skipping !include var '{}' with a {} value",
                            name,
                            value.type_name()
                        ),
                    }
                }
            }
            Some(other) => {
                warn!(
                    "invalid 'vars' in !include: expected a mapping, got a {}",
                    other.type_name()
                );
            }
        }

        Value::IncludeRef(IncludeRef { file_name, vars })
    }
}

fn is_local(tag: &YamlTag) -> bool {
    tag.handle == "!"
}

fn is_core(tag: &YamlTag) -> bool {
    tag.handle == CORE_TAG_PREFIX || tag.handle == "!!"
}

impl MarkedEventReceiver for NodeBuilder<'_> {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.process(ev, mark) {
            self.error = Some(error);
        }
    }
}
