//! The banner's slice of the page and its HTML rendering.

use std::fmt::Write;

use crate::{element::Element, visibility::Visibility};

/// Id of the "already have it" affordance revealed to returning Firefox users.
pub const ALREADY_HAVE_ID: &str = "already-have-extension";

/// Class of the pre-existing mount point nodes.
pub const MOUNT_CLASS: &str = "banner-section";

/// One pre-existing child of the banner container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPoint {
    pub children: Vec<Element>,
}

/// Banner container, its mount points, and display state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerDom {
    pub container_id: String,
    pub mounts: Vec<MountPoint>,
    pub visibility: Visibility,
    /// Set once a handler dismissed the banner; it renders as nothing.
    pub removed: bool,
    pub already_have_visible: bool,
}

impl BannerDom {
    #[must_use]
    pub fn new(container_id: impl Into<String>, mount_points: usize) -> Self {
        Self {
            container_id: container_id.into(),
            mounts: vec![MountPoint::default(); mount_points],
            visibility: Visibility::Undecided,
            removed: false,
            already_have_visible: false,
        }
    }

    /// Every built element, depth first, mount by mount.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.mounts
            .iter()
            .flat_map(|m| m.children.iter())
            .flat_map(|e| e.walk())
    }

    /// Whether the description declared its own affordance element.
    fn declares_affordance(&self) -> bool {
        self.elements()
            .any(|e| e.property("id") == Some(ALREADY_HAVE_ID))
    }

    /// Render the banner as an HTML fragment.
    #[must_use]
    pub fn to_html(&self) -> String {
        if self.removed {
            return String::new();
        }

        let mut out = String::new();
        let style = match self.visibility {
            Visibility::Hidden => " style=\"display:none\"",
            Visibility::Shown | Visibility::Undecided => "",
        };
        let _ = write!(
            out,
            "<div id=\"{}\"{style}>",
            escape_attr(&self.container_id)
        );
        let reveal = self.already_have_visible;
        for mount in &self.mounts {
            let _ = write!(out, "<div class=\"{MOUNT_CLASS}\">");
            for child in &mount.children {
                render_element(child, reveal, &mut out);
            }
            out.push_str("</div>");
        }
        if reveal && !self.declares_affordance() {
            let _ = write!(
                out,
                "<a id=\"{ALREADY_HAVE_ID}\" style=\"display:inline-block\" \
                 data-handler=\"alreadyInstalledClicked\">I already have it</a>"
            );
        }
        out.push_str("</div>");
        out
    }
}

/// Void elements never get a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta", "source", "wbr"];

/// Render one element. With `reveal` set, the affordance element is shown
/// with `display:inline-block` on top of any style it declares.
fn render_element(element: &Element, reveal: bool, out: &mut String) {
    let tag = element.tag.to_ascii_lowercase();
    let mut text = None;
    let mut inner_html = None;
    let revealed = reveal && element.property("id") == Some(ALREADY_HAVE_ID);

    let _ = write!(out, "<{}", escape_attr(&tag));
    for (name, value) in &element.properties {
        match name.as_str() {
            "textContent" | "innerText" => text = Some(value.as_str()),
            "innerHTML" => inner_html = Some(value.as_str()),
            "style" if revealed => {
                let declared = value.trim().trim_end_matches(';');
                let style = if declared.is_empty() {
                    "display:inline-block".to_string()
                } else {
                    format!("{declared};display:inline-block")
                };
                let _ = write!(out, " style=\"{}\"", escape_attr(&style));
            },
            _ => {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    attribute_name(name),
                    escape_attr(value)
                );
            },
        }
    }
    if revealed && element.property("style").is_none() {
        out.push_str(" style=\"display:inline-block\"");
    }
    if let Some(handler) = element.on_click {
        let _ = write!(out, " data-handler=\"{handler}\"");
    }
    out.push('>');

    if VOID_TAGS.contains(&tag.as_str()) {
        return;
    }
    if let Some(html) = inner_html {
        out.push_str(html);
    } else if let Some(text) = text {
        out.push_str(&escape_text(text));
    }
    for child in &element.children {
        render_element(child, reveal, out);
    }
    let _ = write!(out, "</{}>", escape_attr(&tag));
}

/// DOM property name → HTML attribute name.
fn attribute_name(property: &str) -> String {
    match property {
        "className" => "class".into(),
        "htmlFor" => "for".into(),
        other => escape_attr(other),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text)
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
