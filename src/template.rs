//! `{placeholder}` message rendering.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder regex"));

/// Render a message template against a contact's attributes.
///
/// Every `{name}` placeholder must resolve; a partially-rendered message
/// must never go out, so the first unresolved placeholder fails the whole
/// render.
pub fn render(
    template: &str,
    attrs: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0");
        let name = &caps[1];
        let Some(value) = attrs.get(name) else {
            return Err(TemplateError::Unresolved {
                placeholder: name.to_string(),
            });
        };
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}
