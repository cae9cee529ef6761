//! Login page rendering and form parsing.

const TEMPLATE: &str = include_str!("login.html");

/// Values shown on the login page.
#[derive(Debug, Clone, Copy)]
pub struct LoginPage<'a> {
    /// Where the form posts, as seen by the browser.
    pub action: &'a str,
    pub workspace_url: &'a str,
    pub user_name: &'a str,
    pub rejected: bool,
}

impl LoginPage<'_> {
    pub fn render(&self) -> String {
        let error = if self.rejected {
            r#"<p class="error">Invalid user name or token.</p>"#
        } else {
            ""
        };

        // Single pass over the template so substituted values are never
        // scanned for placeholders themselves.
        let mut page = String::with_capacity(TEMPLATE.len() + 256);
        let mut rest = TEMPLATE;
        while let Some(start) = rest.find("{{") {
            page.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                rest = &rest[start..];
                break;
            };
            match &after[..end] {
                "action" => page.push_str(&escape_html(self.action)),
                "workspace_url" => page.push_str(&escape_html(self.workspace_url)),
                "user_name" => page.push_str(&escape_html(self.user_name)),
                "error" => page.push_str(error),
                other => {
                    page.push_str("{{");
                    page.push_str(other);
                    page.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        }
        page.push_str(rest);
        page
    }
}

/// Fields submitted by the login form. Empty values count as absent.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub user_name: Option<String>,
    pub workspace_url: Option<String>,
    pub token: Option<String>,
}

impl LoginForm {
    pub fn parse(body: &[u8]) -> Self {
        let mut form = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "userName" => form.user_name = Some(value.into_owned()),
                "workspaceUrl" => form.workspace_url = Some(value.into_owned()),
                "token" => form.token = Some(value.into_owned()),
                _ => {}
            }
        }
        form
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_escapes_identity() {
        let page = LoginPage {
            action: "/p/8080/dbtunnel/login",
            workspace_url: "https://dbc-1.cloud.databricks.com/",
            user_name: "<script>alert(1)</script>",
            rejected: false,
        }
        .render();
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains(r#"action="/p/8080/dbtunnel/login""#));
        assert!(!page.contains("class=\"error\""));
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let page = LoginPage {
            action: "/dbtunnel/login",
            workspace_url: "https://dbc-1.cloud.databricks.com/{{user_name}}",
            user_name: "{{error}}",
            rejected: true,
        }
        .render();
        assert!(page.contains(r#"value="https://dbc-1.cloud.databricks.com/{{user_name}}""#));
        assert!(page.contains(r#"name="userName" value="{{error}}""#));
        assert_eq!(page.matches("Invalid user name or token.").count(), 1);
    }

    #[test]
    fn rejected_page_shows_error() {
        let page = LoginPage {
            action: "/dbtunnel/login",
            workspace_url: "",
            user_name: "",
            rejected: true,
        }
        .render();
        assert!(page.contains("Invalid user name or token."));
    }

    #[test]
    fn form_fields_are_decoded() {
        let form = LoginForm::parse(
            b"userName=ada%40example.com&workspaceUrl=https%3A%2F%2Fdbc-1.cloud.databricks.com&token=dapi+1&extra=x",
        );
        assert_eq!(form.user_name.as_deref(), Some("ada@example.com"));
        assert_eq!(
            form.workspace_url.as_deref(),
            Some("https://dbc-1.cloud.databricks.com")
        );
        assert_eq!(form.token.as_deref(), Some("dapi 1"));
    }

    #[test]
    fn empty_fields_are_absent() {
        assert_eq!(LoginForm::parse(b"userName=&token="), LoginForm::default());
    }
}
