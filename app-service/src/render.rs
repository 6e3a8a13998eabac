//! Server-side app shell rendering.
//!
//! The renderer produces the `head`, `body` and `style` fragments of an app
//! page; they are then substituted into `templates/app.html`.

use html_escape::{encode_double_quoted_attribute, encode_text};

use common::errors::AppResult;

/// Page template with `{{head}}`, `{{body}}`, `{{style}}` and `{{appId}}` slots.
pub const APP_TEMPLATE: &str = include_str!("../templates/app.html");

/// Inputs of a shell render.
#[derive(Debug, Clone)]
pub struct ShellProps {
    pub title: String,
    pub production: bool,
    pub app_id: String,
    pub client_lib_path: String,
}

/// Fragments produced by a shell render.
#[derive(Debug, Clone, Default)]
pub struct RenderedShell {
    pub head: String,
    pub html: String,
    pub css: String,
}

/// Renders the static part of an app page.
pub trait ShellRenderer: Send + Sync {
    fn render(&self, props: &ShellProps) -> AppResult<RenderedShell>;
}

/// Renderer emitting a loader page that boots the client library.
#[derive(Debug, Default)]
pub struct DefaultShellRenderer;

impl ShellRenderer for DefaultShellRenderer {
    fn render(&self, props: &ShellProps) -> AppResult<RenderedShell> {
        let title = encode_text(&props.title);
        let head = format!(
            concat!(
                "<meta charset=\"utf8\">\n",
                "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
                "<title>{}</title>\n",
                "<script src=\"{}\"></script>"
            ),
            title,
            encode_double_quoted_attribute(&props.client_lib_path),
        );
        let html = format!(
            concat!(
                "<div class=\"app-loading\">{}</div>\n",
                "<script>window[\"##APP_ID##\"] = \"{}\"; window[\"##PRODUCTION##\"] = {};",
                " if (window.loadApp) {{ window.loadApp() }}</script>"
            ),
            title,
            encode_double_quoted_attribute(&props.app_id),
            props.production,
        );
        let css = "html, body { margin: 0; height: 100%; } \
                   .app-loading { display: flex; align-items: center; justify-content: center; height: 100%; }"
            .to_string();
        Ok(RenderedShell { head, html, css })
    }
}

/// Replaces every `{{name}}` slot of `template`; unknown slots are left empty.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if let Some((_, value)) = values.iter().find(|(k, _)| *k == name) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Path the app page loads the client bundle from.
pub fn client_library_path(app_id: &str, version: &str) -> String {
    format!("/api/assets/client?appId={}&v={}", app_id, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_fills_slots() {
        let page = render_template(
            "<b>{{ head }}</b>{{body}}{{missing}}|{{appId}}",
            &[("head", "H"), ("body", "B"), ("appId", "app_1")],
        );
        assert_eq!(page, "<b>H</b>B|app_1");
    }

    #[test]
    fn test_unterminated_slot_is_kept() {
        assert_eq!(render_template("a {{b", &[("b", "x")]), "a {{b");
    }

    #[test]
    fn test_default_shell_escapes_title() {
        let shell = DefaultShellRenderer
            .render(&ShellProps {
                title: "<Sales & Co>".into(),
                production: true,
                app_id: "app_1".into(),
                client_lib_path: client_library_path("app_1", "1.0.0"),
            })
            .unwrap();
        assert!(shell.head.contains("<title>&lt;Sales &amp; Co&gt;</title>"));
        assert!(shell.head.contains("/api/assets/client?appId=app_1&amp;v=1.0.0"));
        assert!(shell.html.contains("window[\"##PRODUCTION##\"] = true"));
    }

    #[test]
    fn test_default_shell_escapes_attribute_values() {
        let shell = DefaultShellRenderer
            .render(&ShellProps {
                title: "Orders".into(),
                production: false,
                app_id: "app_\"1".into(),
                client_lib_path: "/client.js?a=\"b\"".into(),
            })
            .unwrap();
        assert!(shell.head.contains("src=\"/client.js?a=&quot;b&quot;\""));
        assert!(shell.html.contains("app_&quot;1"));
        assert!(!shell.html.contains("app_\"1"));
    }

    #[test]
    fn test_app_template_has_all_slots() {
        for slot in ["{{head}}", "{{body}}", "{{style}}", "{{appId}}"] {
            assert!(APP_TEMPLATE.contains(slot), "missing {}", slot);
        }
    }
}
