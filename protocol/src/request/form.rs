//! The signed form the shopper's browser posts to the bank.

use std::fmt::Write as _;

use crate::codec::{Encoding, FieldMap};

const FORM_ID: &str = "banklink_redirect_url";

/// Action URL, charset and ordered hidden fields of a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectForm {
    action: String,
    encoding: Encoding,
    fields: Vec<(String, String)>,
}

impl RedirectForm {
    /// Lays out `fields` in `order`; fields not listed follow alphabetically.
    pub fn new(action: impl Into<String>, encoding: Encoding, fields: FieldMap, order: &[&str]) -> Self {
        let mut remaining = fields;
        let mut ordered = Vec::with_capacity(remaining.len());
        for name in order {
            if let Some(value) = remaining.remove(*name) {
                ordered.push(((*name).to_string(), value));
            }
        }
        ordered.extend(remaining);

        Self {
            action: action.into(),
            encoding,
            fields: ordered,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn to_field_map(&self) -> FieldMap {
        self.fields.iter().cloned().collect()
    }

    /// A form that submits itself as soon as the page loads.
    pub fn to_html(&self) -> String {
        let mut html = format!(
            r#"<form action="{}" method="POST" id="{FORM_ID}" accept-charset="{}">"#,
            escape_html(&self.action),
            self.encoding.label()
        );
        html.push('\n');
        self.write_inputs(&mut html);
        html.push_str("</form>\n");
        let _ = write!(
            html,
            "<script type=\"text/javascript\">document.forms['{FORM_ID}'].submit();</script>"
        );
        html
    }

    /// The same form with a visible submit button instead of the script.
    pub fn submit_button_html(&self, label: &str) -> String {
        let mut html = format!(
            r#"<form action="{}" method="POST" accept-charset="{}">"#,
            escape_html(&self.action),
            self.encoding.label()
        );
        html.push('\n');
        self.write_inputs(&mut html);
        let _ = writeln!(html, r#"<input type="submit" value="{}" />"#, escape_html(label));
        html.push_str("</form>");
        html
    }

    fn write_inputs(&self, html: &mut String) {
        for (name, value) in &self.fields {
            let _ = writeln!(
                html,
                r#"<input type="hidden" name="{}" value="{}" />"#,
                escape_html(name),
                escape_html(value)
            );
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RedirectForm {
        let fields = FieldMap::from([
            ("VK_MSG".to_string(), r#"Tom & Jerry's "deal" <3"#.to_string()),
            ("VK_SERVICE".to_string(), "1012".to_string()),
            ("EXTRA".to_string(), "x".to_string()),
        ]);
        RedirectForm::new(
            "https://bank.example/pay?a=1&b=2",
            Encoding::Utf8,
            fields,
            &["VK_SERVICE", "VK_MSG"],
        )
    }

    #[test]
    fn test_fields_follow_given_order_then_the_rest() {
        let names: Vec<_> = form().fields().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(names, ["VK_SERVICE", "VK_MSG", "EXTRA"]);
    }

    #[test]
    fn test_html_is_escaped() {
        let html = form().to_html();
        assert!(html.contains(r#"action="https://bank.example/pay?a=1&amp;b=2""#));
        assert!(html.contains("Tom &amp; Jerry&#x27;s &quot;deal&quot; &lt;3"));
        assert!(!html.contains("<3"));
    }

    #[test]
    fn test_auto_submit_script() {
        let html = form().to_html();
        assert!(html.contains(r#"id="banklink_redirect_url" accept-charset="UTF-8""#));
        assert!(html.contains("document.forms['banklink_redirect_url'].submit();"));
    }

    #[test]
    fn test_submit_button_has_no_script() {
        let html = form().submit_button_html("Make the payment");
        assert!(html.contains(r#"<input type="submit" value="Make the payment" />"#));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_field_lookup() {
        let form = form();
        assert_eq!(form.field("VK_SERVICE"), Some("1012"));
        assert_eq!(form.field("VK_MAC"), None);
        assert_eq!(form.to_field_map().len(), 3);
    }
}
