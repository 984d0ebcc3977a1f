//! Structured entity keys and the remote key string encoding.
//!
//! A remote key is the standard base64 encoding of
//!
//! ```text
//! <app-id>@<namespace>!!<Kind>\n<id>\t<Kind>\b<name>
//! ```
//!
//! where `\t` separates path elements, `\n` joins a kind to a numeric id and
//! `\b` joins a kind to a key name. The namespace token `default` stands for
//! the default namespace. A terminal element with id `0` (or with no
//! separator at all) is incomplete: its kind is known but no id or name has
//! been assigned yet.

use crate::error::{CodecError, CodecResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Separates an entity kind from a numeric id.
pub const KIND_ID_SEP: char = '\n';

/// Separates an entity kind from a key name.
pub const KIND_NAME_SEP: char = '\u{8}';

/// Separates the application id from the namespace.
pub const APP_ID_SEP: char = '@';

/// Separates the application scope from the path.
pub const NAMESPACE_SEP: &str = "!!";

/// Namespace token for the default namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Separates consecutive path elements.
pub const PATH_SEP: char = '\t';

const RESERVED: [char; 3] = [KIND_ID_SEP, KIND_NAME_SEP, PATH_SEP];

/// Numeric id or key name of a path element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdOrName {
    /// Positive numeric id.
    Id(u64),
    /// Non-empty key name.
    Name(String),
}

impl From<u64> for IdOrName {
    fn from(id: u64) -> Self {
        IdOrName::Id(id)
    }
}

impl From<&str> for IdOrName {
    fn from(name: &str) -> Self {
        IdOrName::Name(name.to_string())
    }
}

impl From<String> for IdOrName {
    fn from(name: String) -> Self {
        IdOrName::Name(name)
    }
}

/// One `(kind, id-or-name)` step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathElement {
    kind: String,
    id_or_name: Option<IdOrName>,
}

impl PathElement {
    /// Creates a complete path element.
    pub fn new(kind: impl Into<String>, id_or_name: impl Into<IdOrName>) -> Self {
        Self {
            kind: kind.into(),
            id_or_name: Some(id_or_name.into()),
        }
    }

    /// Creates an element whose id or name is not yet assigned.
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id_or_name: None,
        }
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the id or name, if assigned.
    pub fn id_or_name(&self) -> Option<&IdOrName> {
        self.id_or_name.as_ref()
    }

    /// Returns the numeric id, if this element has one.
    pub fn id(&self) -> Option<u64> {
        match self.id_or_name {
            Some(IdOrName::Id(id)) => Some(id),
            _ => None,
        }
    }

    /// Returns the key name, if this element has one.
    pub fn name(&self) -> Option<&str> {
        match &self.id_or_name {
            Some(IdOrName::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// Returns true if an id or name is assigned.
    pub fn is_complete(&self) -> bool {
        self.id_or_name.is_some()
    }

    /// Returns true if this element is addressed by name.
    pub fn is_named(&self) -> bool {
        self.name().is_some()
    }

    fn validate(&self) -> CodecResult<()> {
        if self.kind.is_empty() {
            return Err(CodecError::malformed_key("empty kind"));
        }
        if self.kind.contains(RESERVED) {
            return Err(CodecError::malformed_key(format!(
                "kind {:?} contains a reserved separator",
                self.kind
            )));
        }
        match &self.id_or_name {
            Some(IdOrName::Id(0)) => Err(CodecError::malformed_key("numeric id must be positive")),
            Some(IdOrName::Name(name)) if name.is_empty() => {
                Err(CodecError::malformed_key("empty key name"))
            }
            Some(IdOrName::Name(name)) if name.contains(RESERVED) => Err(
                CodecError::malformed_key(format!("name {name:?} contains a reserved separator")),
            ),
            _ => Ok(()),
        }
    }

    fn encode_into(&self, out: &mut String) {
        out.push_str(&self.kind);
        match &self.id_or_name {
            Some(IdOrName::Id(id)) => {
                out.push(KIND_ID_SEP);
                out.push_str(&id.to_string());
            }
            Some(IdOrName::Name(name)) => {
                out.push(KIND_NAME_SEP);
                out.push_str(name);
            }
            None => {
                out.push(KIND_ID_SEP);
                out.push('0');
            }
        }
    }

    fn decode(segment: &str) -> CodecResult<Self> {
        let element = if let Some((kind, id)) = segment.split_once(KIND_ID_SEP) {
            let parsed: u64 = id
                .parse()
                .map_err(|_| CodecError::malformed_key(format!("invalid numeric id {id:?}")))?;
            if parsed.to_string() != id {
                return Err(CodecError::malformed_key(format!(
                    "non-canonical numeric id {id:?}"
                )));
            }
            if parsed == 0 {
                Self::incomplete(kind)
            } else {
                Self::new(kind, parsed)
            }
        } else if let Some((kind, name)) = segment.split_once(KIND_NAME_SEP) {
            Self::new(kind, name)
        } else {
            Self::incomplete(segment)
        };

        element.validate()?;
        Ok(element)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id_or_name {
            Some(IdOrName::Id(id)) => write!(f, "{}:{}", self.kind, id),
            Some(IdOrName::Name(name)) => write!(f, "{}:{:?}", self.kind, name),
            None => write!(f, "{}:?", self.kind),
        }
    }
}

/// A structured entity key.
///
/// The path always has at least one element; the terminal element names the
/// entity itself and is the only one allowed to be incomplete. Ancestors
/// come first, root-most at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    app_id: String,
    namespace: Option<String>,
    ancestors: Vec<PathElement>,
    terminal: PathElement,
}

impl Key {
    /// Creates a key from an application id, namespace and full path.
    ///
    /// A namespace equal to [`DEFAULT_NAMESPACE`] is normalised to `None`.
    pub fn new(
        app_id: impl Into<String>,
        namespace: Option<String>,
        mut path: Vec<PathElement>,
    ) -> CodecResult<Self> {
        let terminal = path
            .pop()
            .ok_or_else(|| CodecError::malformed_key("key path must not be empty"))?;
        Self::from_parts(app_id.into(), namespace, path, terminal)
    }

    /// Creates a root-level key.
    pub fn root(
        app_id: impl Into<String>,
        namespace: Option<String>,
        element: PathElement,
    ) -> CodecResult<Self> {
        Self::from_parts(app_id.into(), namespace, Vec::new(), element)
    }

    fn from_parts(
        app_id: String,
        namespace: Option<String>,
        ancestors: Vec<PathElement>,
        terminal: PathElement,
    ) -> CodecResult<Self> {
        if app_id.is_empty() {
            return Err(CodecError::malformed_key("empty application id"));
        }
        if app_id.contains(APP_ID_SEP) || app_id.contains(NAMESPACE_SEP) {
            return Err(CodecError::malformed_key(format!(
                "application id {app_id:?} contains a reserved separator"
            )));
        }
        let namespace = namespace.filter(|ns| ns != DEFAULT_NAMESPACE);
        if let Some(ns) = &namespace {
            if ns.contains(NAMESPACE_SEP) || ns.contains(RESERVED) {
                return Err(CodecError::malformed_key(format!(
                    "namespace {ns:?} contains a reserved separator"
                )));
            }
        }
        for ancestor in &ancestors {
            ancestor.validate()?;
            if !ancestor.is_complete() {
                return Err(CodecError::malformed_key(format!(
                    "ancestor {ancestor} is incomplete"
                )));
            }
        }
        terminal.validate()?;

        Ok(Self {
            app_id,
            namespace,
            ancestors,
            terminal,
        })
    }

    /// Creates a child key below this key.
    pub fn child(&self, element: PathElement) -> CodecResult<Self> {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.terminal.clone());
        Self::from_parts(
            self.app_id.clone(),
            self.namespace.clone(),
            ancestors,
            element,
        )
    }

    /// Returns a copy of this key with the terminal element replaced.
    pub fn with_terminal(&self, element: PathElement) -> CodecResult<Self> {
        Self::from_parts(
            self.app_id.clone(),
            self.namespace.clone(),
            self.ancestors.clone(),
            element,
        )
    }

    /// Returns a copy of this key whose terminal element has the given id.
    pub fn with_id(&self, id: u64) -> CodecResult<Self> {
        self.with_terminal(PathElement::new(self.terminal.kind.clone(), id))
    }

    /// Returns the application id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Returns the namespace, `None` for the default namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the ancestor chain, root first.
    pub fn ancestors(&self) -> &[PathElement] {
        &self.ancestors
    }

    /// Returns the element naming the entity itself.
    pub fn terminal(&self) -> &PathElement {
        &self.terminal
    }

    /// Iterates over the full path, root first.
    pub fn path(&self) -> impl Iterator<Item = &PathElement> {
        self.ancestors.iter().chain(std::iter::once(&self.terminal))
    }

    /// Returns the number of path elements.
    pub fn depth(&self) -> usize {
        self.ancestors.len() + 1
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> &str {
        self.terminal.kind()
    }

    /// Returns the numeric id of the entity, if any.
    pub fn id(&self) -> Option<u64> {
        self.terminal.id()
    }

    /// Returns the key name of the entity, if any.
    pub fn name(&self) -> Option<&str> {
        self.terminal.name()
    }

    /// Returns true if the terminal element has an id or name.
    pub fn is_complete(&self) -> bool {
        self.terminal.is_complete()
    }

    /// Returns true if every path element is addressed by name.
    pub fn is_fully_named(&self) -> bool {
        self.path().all(PathElement::is_named)
    }

    /// Returns the parent key, or `None` for a root-level key.
    pub fn parent(&self) -> Option<Key> {
        let mut ancestors = self.ancestors.clone();
        let terminal = ancestors.pop()?;
        Some(Self {
            app_id: self.app_id.clone(),
            namespace: self.namespace.clone(),
            ancestors,
            terminal,
        })
    }

    /// Returns true if this key is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        self.app_id == other.app_id
            && self.namespace == other.namespace
            && other.ancestors.len() > self.ancestors.len()
            && other
                .ancestors
                .iter()
                .zip(self.path())
                .all(|(theirs, ours)| theirs == ours)
    }

    /// Encodes this key as a remote key string.
    pub fn to_remote(&self) -> String {
        STANDARD.encode(self.to_raw())
    }

    /// Decodes a remote key string issued for the given application.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::AccessDenied`] if the key names another
    /// application and [`CodecError::MalformedKey`] if it cannot be parsed.
    pub fn from_remote(encoded: &str, app_id: &str) -> CodecResult<Self> {
        let raw = decode_raw(encoded)?;
        let (scope, path) = split_scope(&raw)?;
        if scope.0 != app_id {
            return Err(CodecError::access_denied(app_id, scope.0));
        }
        Self::parse_path(scope, path)
    }

    /// Decodes a remote key string without checking its application id.
    pub fn decode_remote(encoded: &str) -> CodecResult<Self> {
        let raw = decode_raw(encoded)?;
        let (scope, path) = split_scope(&raw)?;
        Self::parse_path(scope, path)
    }

    fn parse_path((app_id, namespace): (&str, &str), path: &str) -> CodecResult<Self> {
        let namespace = (namespace != DEFAULT_NAMESPACE).then(|| namespace.to_string());
        let elements = path
            .split(PATH_SEP)
            .map(PathElement::decode)
            .collect::<CodecResult<Vec<_>>>()?;
        Self::new(app_id, namespace, elements)
    }

    fn to_raw(&self) -> String {
        let mut raw = String::with_capacity(64);
        raw.push_str(&self.app_id);
        raw.push(APP_ID_SEP);
        raw.push_str(self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE));
        raw.push_str(NAMESPACE_SEP);
        for (i, element) in self.path().enumerate() {
            if i > 0 {
                raw.push(PATH_SEP);
            }
            element.encode_into(&mut raw);
        }
        raw
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.app_id,
            self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
        )?;
        for element in self.path() {
            write!(f, " {element}")?;
        }
        Ok(())
    }
}

fn decode_raw(encoded: &str) -> CodecResult<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CodecError::malformed_key(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| CodecError::malformed_key("key is not valid UTF-8"))
}

fn split_scope(raw: &str) -> CodecResult<((&str, &str), &str)> {
    let (scope, path) = raw
        .split_once(NAMESPACE_SEP)
        .ok_or_else(|| CodecError::malformed_key("missing namespace separator"))?;
    let (app_id, namespace) = scope
        .split_once(APP_ID_SEP)
        .ok_or_else(|| CodecError::malformed_key("missing application id separator"))?;
    if app_id.is_empty() {
        return Err(CodecError::malformed_key("empty application id"));
    }
    Ok(((app_id, namespace), path))
}

/// Outcome of resolving the parent of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentResolution {
    /// The key is root-level.
    Root,
    /// The parent resolved to a concrete key.
    Resolved(Key),
    /// The parent chain contains client-local ids with no known mapping.
    Unresolved,
}

impl ParentResolution {
    /// Returns the resolved parent key, if any.
    pub fn key(&self) -> Option<&Key> {
        match self {
            ParentResolution::Resolved(key) => Some(key),
            _ => None,
        }
    }
}

/// Resolves the parent of a client key to a server key.
///
/// A fully named ancestor chain maps to itself. Otherwise `lookup` is asked
/// for the target key recorded under the parent's own remote key.
pub fn resolve_parent<E, F>(key: &Key, lookup: F) -> Result<ParentResolution, E>
where
    F: FnOnce(&str) -> Result<Option<Key>, E>,
{
    let Some(parent) = key.parent() else {
        return Ok(ParentResolution::Root);
    };

    if parent.is_fully_named() {
        return Ok(ParentResolution::Resolved(parent));
    }

    Ok(match lookup(&parent.to_remote())? {
        Some(target) => ParentResolution::Resolved(target),
        None => ParentResolution::Unresolved,
    })
}
