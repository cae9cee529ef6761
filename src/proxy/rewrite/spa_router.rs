//! Client-side router fix-up for minified SPA bundles.
//!
//! A path prefix cannot be injected into a minified router table, so the
//! bundle's catch-all route (`* → <Navigate to="/">`) is rewritten to render
//! whatever component the `/` route renders. Any unknown path, including the
//! prefixed one the browser actually sees, then shows the application root.
//!
//! BRITTLE: both patterns are pinned to the shape React Router's JSX runtime
//! emits after minification (`{path:"/",element:X.jsx(Y,{})}`). An upstream
//! dependency upgrade that changes the emitted shape makes this a no-op; it
//! must never make it fail. Covered by the golden bundle under
//! `tests/fixtures/`.

use std::borrow::Cow;

use regex::bytes::{NoExpand, Regex};

const DEFAULT_ROUTE: &str = r#"\{path:"/",element:([\w$]+)\.jsx\(([\w$]+),\{\}\)\}"#;
const CATCH_ALL_REDIRECT: &str =
    r#"\{path:"\*",element:[\w$]+\.jsx\([\w$]+,\{replace:!0,to:"/"\}\)\}"#;

#[derive(Debug, Clone)]
pub struct SpaRouterRewrite {
    default_route: Regex,
    catch_all: Regex,
}

impl SpaRouterRewrite {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            default_route: Regex::new(DEFAULT_ROUTE)?,
            catch_all: Regex::new(CATCH_ALL_REDIRECT)?,
        })
    }

    /// Point the catch-all route at the default route's component.
    ///
    /// Returns the input unchanged when either pattern is missing. Applying
    /// it to its own output is a no-op because the redirect is gone.
    pub fn apply<'a>(&self, bundle: &'a [u8]) -> Cow<'a, [u8]> {
        let Some(caps) = self.default_route.captures(bundle) else {
            tracing::debug!("SPA default route not found; bundle left untouched");
            return Cow::Borrowed(bundle);
        };
        let jsx = String::from_utf8_lossy(&caps[1]);
        let component = String::from_utf8_lossy(&caps[2]);
        let replacement = format!(r#"{{path:"*",element:{jsx}.jsx({component},{{}})}}"#);

        self.catch_all
            .replace_all(bundle, NoExpand(replacement.as_bytes()))
    }
}
