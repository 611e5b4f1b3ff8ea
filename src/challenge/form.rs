use kuchiki::NodeRef;
use thiserror::Error;
use url::Url;

use crate::dom::{attr, parse_snippet, select_all};
use crate::net::HttpRequest;

const BUSY_INDICATOR: &str = r#"<span class="ddloader"></span>"#;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid form action '{action}': {source}")]
    Action {
        action: String,
        source: url::ParseError,
    },
}

/// Build the asynchronous request for an intercepted form submission, the
/// way a native submission would: method and action from the form element,
/// fields serialized into the query string (GET) or a form-encoded body
/// (POST). The action is resolved against the page's base URL.
pub(crate) fn form_request(form: &NodeRef, base_url: &Url) -> Result<HttpRequest, FormError> {
    let fields = serialize_form(form);
    let action = attr(form, "action").unwrap_or_default();
    let mut url = if action.is_empty() {
        base_url.clone()
    } else {
        base_url.join(&action).map_err(|source| FormError::Action {
            action: action.clone(),
            source,
        })?
    };

    let method = attr(form, "method")
        .map(|method| method.to_ascii_lowercase())
        .unwrap_or_default();
    if method == "post" {
        let body = serde_urlencoded::to_string(&fields).unwrap_or_default();
        Ok(HttpRequest::post(url, body))
    } else {
        url.set_query(None);
        if !fields.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &fields {
                pairs.append_pair(name, value);
            }
        }
        Ok(HttpRequest::get(url))
    }
}

/// Serialize the form's named controls in document order.
pub(crate) fn serialize_form(form: &NodeRef) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for control in select_all(form, "input[name], select[name], textarea[name]") {
        let Some(element) = control.as_element() else {
            continue;
        };
        let tag = element.name.local.as_ref().to_string();
        let (name, kind, value, checked, disabled) = {
            let attributes = element.attributes.borrow();
            (
                attributes.get("name").map(str::to_string),
                attributes.get("type").map(|t| t.to_ascii_lowercase()),
                attributes.get("value").map(str::to_string),
                attributes.contains("checked"),
                attributes.contains("disabled"),
            )
        };
        if disabled {
            continue;
        }
        let Some(name) = name else {
            continue;
        };

        match tag.as_str() {
            "input" => {
                let kind = kind.unwrap_or_else(|| "text".to_string());
                match kind.as_str() {
                    "submit" | "button" | "reset" | "file" | "image" => {}
                    "checkbox" | "radio" => {
                        if checked {
                            fields.push((name, value.unwrap_or_else(|| "on".to_string())));
                        }
                    }
                    _ => fields.push((name, value.unwrap_or_default())),
                }
            }
            "textarea" => fields.push((name, control.text_contents())),
            "select" => {
                let options = select_all(&control, "option");
                let chosen = options
                    .iter()
                    .find(|option| {
                        option
                            .as_element()
                            .map(|element| element.attributes.borrow().contains("selected"))
                            .unwrap_or(false)
                    })
                    .or_else(|| options.first());
                if let Some(option) = chosen {
                    let value = attr(option, "value").unwrap_or_else(|| option.text_contents());
                    fields.push((name, value));
                }
            }
            _ => {}
        }
    }
    fields
}

/// Replace the form's visible content with the busy indicator.
pub(crate) fn show_busy(form: &NodeRef) {
    let children: Vec<NodeRef> = form.children().collect();
    for child in children {
        child.detach();
    }
    for node in parse_snippet(BUSY_INDICATOR) {
        form.append(node);
    }
}

pub(crate) fn enclosing_form(node: &NodeRef) -> Option<NodeRef> {
    node.ancestors().find(|ancestor| {
        ancestor
            .as_element()
            .map(|element| element.name.local.as_ref() == "form")
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageDocument;
    use crate::net::Method;

    fn form_from(html: &str) -> NodeRef {
        let document = PageDocument::parse(html);
        document.select_first("form").expect("form")
    }

    #[test]
    fn serializes_named_controls_in_order() {
        let form = form_from(
            r#"<form>
                <input name="user" value="bob">
                <input type="checkbox" name="rated" checked>
                <input type="checkbox" name="casual">
                <input type="submit" name="go" value="Go">
                <textarea name="note">hi</textarea>
            </form>"#,
        );

        let fields = serialize_form(&form);
        assert_eq!(
            fields,
            vec![
                ("user".to_string(), "bob".to_string()),
                ("rated".to_string(), "on".to_string()),
                ("note".to_string(), "hi".to_string()),
            ]
        );
    }

    #[test]
    fn skips_disabled_controls() {
        let form = form_from(
            r#"<form>
                <input name="user" value="bob" disabled>
                <input name="color" value="white">
                <textarea name="note" disabled>hi</textarea>
            </form>"#,
        );
        assert_eq!(
            serialize_form(&form),
            vec![("color".to_string(), "white".to_string())]
        );
    }

    #[test]
    fn select_prefers_selected_option() {
        let form = form_from(
            r#"<form>
                <select name="color">
                    <option value="white">White</option>
                    <option value="black" selected>Black</option>
                </select>
            </form>"#,
        );
        assert_eq!(
            serialize_form(&form),
            vec![("color".to_string(), "black".to_string())]
        );
    }

    #[test]
    fn post_form_builds_encoded_body() {
        let base = Url::parse("https://example.org/challenge/abc").expect("base");
        let form = form_from(
            r#"<form class="xhr" method="post" action="/challenge/abc/decline">
                <input name="reason" value="later &amp; busy">
            </form>"#,
        );

        let request = form_request(&form, &base).expect("request");
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url.path(), "/challenge/abc/decline");
        assert_eq!(request.body.as_deref(), Some("reason=later+%26+busy"));
    }

    #[test]
    fn get_form_encodes_fields_into_query() {
        let base = Url::parse("https://example.org/challenge/abc").expect("base");
        let form = form_from(
            r#"<form method="get" action="search">
                <input name="q" value="magnus">
            </form>"#,
        );

        let request = form_request(&form, &base).expect("request");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url.query(), Some("q=magnus"));
        assert!(request.body.is_none());
    }

    #[test]
    fn busy_indicator_replaces_form_content() {
        let form = form_from(r#"<form class="accept"><button>Accept</button></form>"#);
        show_busy(&form);

        let children: Vec<NodeRef> = form.children().collect();
        assert_eq!(children.len(), 1);
        let element = children[0].as_element().expect("element");
        assert_eq!(element.name.local.as_ref(), "span");
        assert_eq!(
            element.attributes.borrow().get("class"),
            Some("ddloader")
        );
    }
}
