//! Key conversion commands.

use serde::Serialize;
use synkit_codec::{Key, PathElement};

/// Decoded remote key.
#[derive(Debug, Serialize)]
pub struct KeyView {
    /// Application id.
    pub app_id: String,
    /// Namespace, absent for the default one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Path from the root.
    pub path: Vec<ElementView>,
    /// Whether the terminal element has an id or name.
    pub complete: bool,
}

/// One path element.
#[derive(Debug, Serialize)]
pub struct ElementView {
    /// Kind.
    pub kind: String,
    /// Numeric id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Key> for KeyView {
    fn from(key: &Key) -> Self {
        Self {
            app_id: key.app_id().to_string(),
            namespace: key.namespace().map(str::to_string),
            path: key
                .path()
                .map(|element| ElementView {
                    kind: element.kind().to_string(),
                    id: element.id(),
                    name: element.name().map(str::to_string),
                })
                .collect(),
            complete: key.is_complete(),
        }
    }
}

/// Runs the decode-key command.
pub fn decode(remote_key: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let key = Key::decode_remote(remote_key.trim())?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&KeyView::from(&key))?);
        }
        _ => {
            println!("{key}");
        }
    }

    Ok(())
}

/// Runs the encode-key command.
pub fn encode(
    app_id: &str,
    namespace: Option<String>,
    path: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", build_key(app_id, namespace, path)?.to_remote());
    Ok(())
}

fn build_key(
    app_id: &str,
    namespace: Option<String>,
    path: &[String],
) -> Result<Key, Box<dyn std::error::Error>> {
    let elements = path
        .iter()
        .map(|element| parse_element(element))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Key::new(app_id, namespace, elements)?)
}

/// Parses `Kind:name`, `Kind:"name"`, `Kind:42`, `Kind:?` or `Kind`.
///
/// Digits are an id unless quoted; `0`, `?` and a bare kind are incomplete.
fn parse_element(text: &str) -> Result<PathElement, Box<dyn std::error::Error>> {
    let Some((kind, rest)) = text.split_once(':') else {
        return Ok(PathElement::incomplete(text));
    };
    if kind.is_empty() {
        return Err(format!("missing kind in {text:?}").into());
    }

    if rest.is_empty() || rest == "?" || rest == "0" {
        return Ok(PathElement::incomplete(kind));
    }
    if rest.starts_with('"') {
        let name: String =
            serde_json::from_str(rest).map_err(|e| format!("bad quoted name {rest}: {e}"))?;
        return Ok(PathElement::new(kind, name));
    }
    if rest.bytes().all(|b| b.is_ascii_digit()) {
        let id: u64 = rest.parse()?;
        return Ok(PathElement::new(kind, id));
    }
    Ok(PathElement::new(kind, rest))
}
