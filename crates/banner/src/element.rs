//! Typed element specs and the builder that turns them into elements.
//!
//! A spec is validated when parsed, so building never fails on a bad
//! handler name or malformed field: those are rejected with the rest of the
//! description at load time.

use {
    serde_json::{Map, Value},
    tracing::debug,
};

use crate::{
    client::{ClientContext, MobileOs},
    dom::BannerDom,
    error::{Error, Result},
    handlers::Handler,
};

/// Class of the per-segment wrapper appended to each mount point.
pub const CONTAINER_CLASS: &str = "banner-content-container";

/// One field of an element spec, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSpec {
    /// Copied verbatim onto the element.
    Standard { name: String, value: String },
    /// Click handler from the fixed registry.
    OnClick(Handler),
    /// Link target per mobile OS; becomes `href`.
    Mobile(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: Vec<AttributeSpec>,
}

impl ElementSpec {
    /// Parse one spec object. `path` locates it in error messages.
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(Error::invalid(path, "element spec must be an object"));
        };
        let Some(tag) = fields.get("type").and_then(Value::as_str) else {
            return Err(Error::MissingType {
                path: path.to_string(),
            });
        };
        if tag.trim().is_empty() {
            return Err(Error::MissingType {
                path: path.to_string(),
            });
        }
        if !is_valid_name(tag) {
            return Err(Error::invalid(
                format!("{path}.type"),
                format!("\"{tag}\" is not a valid tag name"),
            ));
        }

        let mut attributes = Vec::with_capacity(fields.len().saturating_sub(1));
        for (name, value) in fields {
            let field_path = format!("{path}.{name}");
            if !is_valid_name(name) {
                return Err(Error::invalid(
                    field_path,
                    format!("\"{name}\" is not a valid attribute name"),
                ));
            }
            match name.as_str() {
                "type" => {},
                "onclick" => attributes.push(AttributeSpec::OnClick(parse_handler(
                    value,
                    &field_path,
                )?)),
                "mobile" => attributes.push(AttributeSpec::Mobile(parse_mobile(
                    value,
                    &field_path,
                )?)),
                _ => {
                    if let Some(value) = scalar(value, &field_path)? {
                        attributes.push(AttributeSpec::Standard {
                            name: name.clone(),
                            value,
                        });
                    }
                },
            }
        }

        Ok(Self {
            tag: tag.to_string(),
            attributes,
        })
    }
}

/// Tag and attribute names: an ASCII letter, then letters, digits, `-` or `_`.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn parse_handler(value: &Value, path: &str) -> Result<Handler> {
    let Some(name) = value.as_str() else {
        return Err(Error::invalid(path, "onclick must name a handler"));
    };
    name.parse().map_err(|_| Error::UnknownHandler {
        name: name.to_string(),
        path: path.to_string(),
        suggestion: nudge_config::suggest(name, &Handler::names(), 3),
    })
}

fn parse_mobile(value: &Value, path: &str) -> Result<Vec<(String, String)>> {
    let Value::Object(variants) = value else {
        return Err(Error::invalid(path, "mobile must map an OS name to a link"));
    };
    variants
        .iter()
        .map(|(os, link)| match link.as_str() {
            Some(link) => Ok((os.clone(), link.to_string())),
            None => Err(Error::invalid(
                format!("{path}.{os}"),
                "mobile link must be a string",
            )),
        })
        .collect()
}

/// Scalar attribute value as text. `null` means "leave the attribute off".
fn scalar(value: &Value, path: &str) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(Error::invalid(
            path,
            "attribute values must be strings, numbers or booleans",
        )),
    }
}

/// A constructed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Properties in assignment order. Assigning an existing name replaces
    /// its value in place.
    pub properties: Vec<(String, String)>,
    pub on_click: Option<Handler>,
    pub children: Vec<Element>,
}

impl Element {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            properties: Vec::new(),
            on_click: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.properties.push((name.to_string(), value)),
        }
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Depth-first iterator over this element and its descendants.
    pub fn walk(&self) -> impl Iterator<Item = &Element> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

/// Builds elements for one client; `mobile` links resolve against its OS.
#[derive(Debug, Clone, Copy)]
pub struct ElementBuilder<'a> {
    client: &'a ClientContext,
}

impl<'a> ElementBuilder<'a> {
    #[must_use]
    pub fn new(client: &'a ClientContext) -> Self {
        Self { client }
    }

    /// Construct one element from its spec, applying fields in document order.
    #[must_use]
    pub fn construct_one(&self, spec: &ElementSpec) -> Element {
        let mut element = Element::new(&spec.tag);
        for attribute in &spec.attributes {
            match attribute {
                AttributeSpec::Standard { name, value } => element.set_property(name, value),
                AttributeSpec::OnClick(handler) => element.on_click = Some(*handler),
                AttributeSpec::Mobile(variants) => {
                    match resolve_mobile(variants, self.client.mobile_os) {
                        Some(link) => element.set_property("href", link),
                        None => debug!(
                            os = %self.client.mobile_os,
                            tag = %spec.tag,
                            "no mobile link for this device"
                        ),
                    }
                },
            }
        }
        element
    }

    /// Wrap each segment in a container and append it to the mount point
    /// with the same index.
    ///
    /// Rejects the whole build before touching `dom` when there are more
    /// segments than mount points.
    pub fn build(&self, segments: &[Vec<ElementSpec>], dom: &mut BannerDom) -> Result<()> {
        if segments.len() > dom.mounts.len() {
            return Err(Error::MountPointMissing {
                segments: segments.len(),
                mounts: dom.mounts.len(),
            });
        }

        for (segment, mount) in segments.iter().zip(dom.mounts.iter_mut()) {
            let mut container = Element::new("div");
            container.set_property("className", CONTAINER_CLASS);
            for spec in segment {
                container.append(self.construct_one(spec));
            }
            mount.children.push(container);
        }
        Ok(())
    }
}

fn resolve_mobile(variants: &[(String, String)], os: MobileOs) -> Option<&str> {
    if os == MobileOs::None {
        return None;
    }
    variants
        .iter()
        .find(|(name, _)| name == os.as_str())
        .map(|(_, link)| link.as_str())
}

/// Parse the `elements` field: a sequence of segments, each a sequence of
/// specs. Objects are accepted in place of arrays and read in key order.
pub fn parse_segments(value: &Value) -> Result<Vec<Vec<ElementSpec>>> {
    ordered_values(value, "elements")?
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            let path = format!("elements[{i}]");
            ordered_values(segment, &path)?
                .into_iter()
                .enumerate()
                .map(|(j, spec)| ElementSpec::from_value(spec, &format!("{path}[{j}]")))
                .collect()
        })
        .collect()
}

pub(crate) fn ordered_values<'v>(value: &'v Value, path: &str) -> Result<Vec<&'v Value>> {
    match value {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(map) => Ok(Map::values(map).collect()),
        _ => Err(Error::invalid(path, "expected an array or object")),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) Mobile/15E148";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14) Chrome/120.0 Mobile Safari/537.36";

    fn spec(value: Value) -> ElementSpec {
        ElementSpec::from_value(&value, "elements[0][0]").unwrap()
    }

    #[test]
    fn anchor_with_mobile_link_and_handler() {
        let spec = spec(json!({
            "type": "a",
            "mobile": {"ios": "url-a", "android": "url-b"},
            "onclick": "noThanksClicked"
        }));

        let ios = ClientContext::detect(IPHONE, None);
        let element = ElementBuilder::new(&ios).construct_one(&spec);
        assert_eq!(element.tag, "a");
        assert_eq!(element.property("href"), Some("url-a"));
        assert_eq!(element.property("mobile"), None);
        assert_eq!(element.on_click, Some(Handler::NoThanksClicked));

        let android = ClientContext::detect(ANDROID, None);
        let element = ElementBuilder::new(&android).construct_one(&spec);
        assert_eq!(element.property("href"), Some("url-b"));
    }

    #[test]
    fn desktop_gets_no_mobile_href() {
        let spec = spec(json!({"type": "a", "mobile": {"ios": "url-a"}}));
        let desktop = ClientContext::detect("Firefox/121.0", None);
        let element = ElementBuilder::new(&desktop).construct_one(&spec);
        assert_eq!(element.property("href"), None);
    }

    #[test]
    fn fields_apply_in_document_order() {
        let spec = spec(json!({
            "type": "a",
            "mobile": {"ios": "from-mobile"},
            "className": "cta",
            "href": "from-field",
            "tabIndex": 2,
            "hidden": false,
            "title": null
        }));
        let ios = ClientContext::detect(IPHONE, None);
        let element = ElementBuilder::new(&ios).construct_one(&spec);
        assert_eq!(element.properties, vec![
            ("href".to_string(), "from-field".to_string()),
            ("className".to_string(), "cta".to_string()),
            ("tabIndex".to_string(), "2".to_string()),
            ("hidden".to_string(), "false".to_string()),
        ]);
    }

    #[test]
    fn unknown_handler_rejected_with_suggestion() {
        let err = ElementSpec::from_value(
            &json!({"type": "button", "onclick": "noThanksClick"}),
            "elements[1][2]",
        )
        .unwrap_err();
        match err {
            Error::UnknownHandler {
                name,
                path,
                suggestion,
            } => {
                assert_eq!(name, "noThanksClick");
                assert_eq!(path, "elements[1][2].onclick");
                assert_eq!(suggestion, Some("noThanksClicked"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn markup_in_names_rejected() {
        let err = ElementSpec::from_value(
            &json!({"type": "img src=x onerror=alert(1)"}),
            "elements[0][0]",
        )
        .unwrap_err();
        assert!(
            matches!(err, Error::InvalidSpec { ref path, .. } if path == "elements[0][0].type")
        );

        let err = ElementSpec::from_value(
            &json!({"type": "a", "x onmouseover": "steal()"}),
            "elements[0][1]",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSpec { ref path, .. } if path == "elements[0][1].x onmouseover"
        ));
    }

    #[test]
    fn name_rules() {
        for ok in ["a", "IMG", "h1", "className", "data-role", "aria_label"] {
            assert!(is_valid_name(ok), "{ok}");
        }
        for bad in ["", "1a", "-x", "a b", "a=b", "a<", "a\"", "a/"] {
            assert!(!is_valid_name(bad), "{bad}");
        }
    }

    #[test]
    fn missing_type_rejected() {
        let err = ElementSpec::from_value(&json!({"className": "x"}), "elements[0][0]").unwrap_err();
        assert!(matches!(err, Error::MissingType { .. }));
    }

    #[test]
    fn nested_object_attribute_rejected() {
        let err = ElementSpec::from_value(&json!({"type": "div", "style": {"color": "red"}}), "e")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { ref path, .. } if path == "e.style"));
    }

    #[test]
    fn build_appends_containers_to_matching_mounts() {
        let segments = parse_segments(&json!([
            [{"type": "img", "src": "logo.png"}],
            [{"type": "span", "textContent": "Try it"}, {"type": "a", "onclick": "addClicked"}]
        ]))
        .unwrap();
        let client = ClientContext::detect("Firefox", None);
        let mut dom = BannerDom::new("generic-banner", 3);

        ElementBuilder::new(&client).build(&segments, &mut dom).unwrap();

        assert_eq!(dom.mounts[0].children.len(), 1);
        assert_eq!(dom.mounts[1].children[0].children.len(), 2);
        assert_eq!(
            dom.mounts[1].children[0].property("className"),
            Some(CONTAINER_CLASS)
        );
        assert!(dom.mounts[2].children.is_empty());
    }

    #[test]
    fn too_many_segments_leaves_dom_untouched() {
        let segments = parse_segments(&json!([[{"type": "p"}], [{"type": "p"}]])).unwrap();
        let client = ClientContext::detect("Firefox", None);
        let mut dom = BannerDom::new("generic-banner", 1);

        let err = ElementBuilder::new(&client)
            .build(&segments, &mut dom)
            .unwrap_err();
        assert!(matches!(err, Error::MountPointMissing {
            segments: 2,
            mounts: 1
        }));
        assert!(dom.mounts[0].children.is_empty());
    }

    #[test]
    fn segments_may_be_objects() {
        let segments = parse_segments(&json!({
            "left": {"logo": {"type": "img"}},
            "right": [{"type": "a"}]
        }))
        .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0][0].tag, "img");
        assert_eq!(segments[1][0].tag, "a");
    }

    #[test]
    fn walk_visits_depth_first() {
        let mut root = Element::new("div");
        let mut child = Element::new("span");
        child.append(Element::new("b"));
        root.append(child);
        root.append(Element::new("a"));
        let tags: Vec<_> = root.walk().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["div", "span", "b", "a"]);
    }
}
