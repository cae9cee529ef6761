//! Rule sets for each supported framework.
//!
//! Each builder closes over the base path so transforms only need the body.

use std::sync::Arc;

use crate::proxy::rewrite::{RewriteRule, RuleError, SpaRouterRewrite, Substitutions};
use crate::proxy::{BasePath, FrameworkKind};

pub fn rules_for(kind: FrameworkKind, base: &BasePath) -> Result<Vec<RewriteRule>, RuleError> {
    match kind {
        FrameworkKind::Generic | FrameworkKind::Streamlit => Ok(Vec::new()),
        FrameworkKind::Gradio => gradio(base),
        FrameworkKind::Chainlit => chainlit(base),
        FrameworkKind::ArizePhoenix => arize_phoenix(base),
    }
}

fn substitute(subs: Arc<Substitutions>) -> impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static {
    move |body| subs.apply(body).into_owned()
}

fn gradio(base: &BasePath) -> Result<Vec<RewriteRule>, RuleError> {
    let bundle = Arc::new(
        Substitutions::prefixing(&["/theme.css", "/info", "/queue", "/assets"], base)?
            .with(r#"to:"/","#, format!(r#"to:"{}","#, base.root()))?,
    );

    // Gradio ships both casings of the entry bundle.
    Ok(vec![
        RewriteRule::new("*assets/index-*.js", substitute(bundle.clone()))?,
        RewriteRule::new("*assets/Index-*.js", substitute(bundle))?,
    ])
}

fn chainlit(base: &BasePath) -> Result<Vec<RewriteRule>, RuleError> {
    let root = base.root();

    let page = Arc::new(Substitutions::prefixing(&["/assets", "/public", "/favicon"], base)?);
    let settings = Arc::new(Substitutions::prefixing(&["/public"], base)?);

    let thread_routes = [
        Substitutions::new([("`/thread/${d.id}`", format!("`{root}thread/${{d.id}}`"))])?
            .first_only(),
        Substitutions::new([(r#""/thread/:id?""#, format!(r#""{root}thread/:id?""#))])?
            .first_only(),
        Substitutions::new([(r#""/element/:id""#, format!(r#""{root}element/:id""#))])?
            .first_only(),
    ];
    let bundle_uris = Substitutions::prefixing(
        &[
            "/feedback",
            "/project",
            "/auth/config",
            "/ws/socket.io",
            "/logo",
            "/readme",
            "/login",
            "/auth",
        ],
        base,
    )?
    .with(r#"to:"/","#, format!(r#"to:"{root}","#))?
    .with(r#"callbackUrl:"/""#, format!(r#"callbackUrl:"{root}""#))?;
    let router = SpaRouterRewrite::new()?;

    let bundle = move |body: &[u8]| {
        let mut out = body.to_vec();
        for subs in &thread_routes {
            out = subs.apply(&out).into_owned();
        }
        out = bundle_uris.apply(&out).into_owned();
        router.apply(&out).into_owned()
    };

    let stylesheet = |body: &[u8]| {
        let mut out = body.to_vec();
        out.extend_from_slice(b" #new-chat-button {display: none;}");
        out
    };

    Ok(vec![
        RewriteRule::new("/", substitute(page.clone()))?,
        RewriteRule::new("/login", substitute(page))?,
        RewriteRule::new("*assets/index-*.js", bundle)?,
        RewriteRule::new("*settings", substitute(settings))?,
        RewriteRule::new("*assets/index-*.css", stylesheet)?,
    ])
}

fn arize_phoenix(base: &BasePath) -> Result<Vec<RewriteRule>, RuleError> {
    let page = Arc::new(Substitutions::prefixing(
        &[
            "/index.css",
            "/modernizr.js",
            "/favicon.ico",
            "/index.js",
            "/graphql",
            "/projects",
        ],
        base,
    )?);
    let bundle = Arc::new(Substitutions::prefixing(&["/graphql", "/projects"], base)?);

    Ok(vec![
        RewriteRule::new("/", substitute(page.clone()))?,
        RewriteRule::new("/projects/", substitute(page.clone()))?,
        RewriteRule::new("/projects/*", substitute(page))?,
        RewriteRule::new("*/index.js", substitute(bundle))?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::rewrite::RuleSet;

    fn rules(kind: FrameworkKind) -> RuleSet {
        RuleSet::for_framework(kind, &BasePath::new("/driver-proxy/o/1/abc/7860/")).unwrap()
    }

    fn text(body: Vec<u8>) -> String {
        String::from_utf8(body).unwrap()
    }

    #[test]
    fn generic_and_streamlit_have_no_rules() {
        assert!(rules(FrameworkKind::Generic).is_empty());
        assert!(rules(FrameworkKind::Streamlit).is_empty());
    }

    #[test]
    fn gradio_bundle_uris_are_prefixed() {
        let rules = rules(FrameworkKind::Gradio);
        let (pattern, body) = rules
            .rewrite(
                "/assets/index-D3f.js",
                br#"fetch("/info");new URL("/queue/join");{to:"/",x:1}"#,
            )
            .unwrap();
        assert_eq!(pattern, "*assets/index-*.js");
        assert_eq!(
            text(body),
            r#"fetch("/driver-proxy/o/1/abc/7860/info");new URL("/driver-proxy/o/1/abc/7860/queue/join");{to:"/driver-proxy/o/1/abc/7860/",x:1}"#
        );
        assert!(rules.find("/assets/Index-9a.js").is_some());
    }

    #[test]
    fn chainlit_bare_prefix_gets_the_root_page_rule() {
        let base = BasePath::new("/driver-proxy/o/1/abc/7860/");
        let rules = RuleSet::for_framework(FrameworkKind::Chainlit, &base).unwrap();
        for requested in ["/driver-proxy/o/1/abc/7860", "/driver-proxy/o/1/abc/7860/"] {
            let upstream_path = base.strip(requested).unwrap();
            assert_eq!(upstream_path, "/");
            assert_eq!(rules.find(upstream_path).unwrap().pattern(), "/");
        }
    }

    #[test]
    fn chainlit_root_page_prefixes_static_assets() {
        let rules = rules(FrameworkKind::Chainlit);
        let (pattern, body) = rules
            .rewrite("/", br#"<link rel="icon" href="/favicon"><script src="/assets/index-1.js">"#)
            .unwrap();
        assert_eq!(pattern, "/");
        assert_eq!(
            text(body),
            r#"<link rel="icon" href="/driver-proxy/o/1/abc/7860/favicon"><script src="/driver-proxy/o/1/abc/7860/assets/index-1.js">"#
        );
    }

    #[test]
    fn chainlit_stylesheet_hides_new_chat_button() {
        let rules = rules(FrameworkKind::Chainlit);
        let (_, body) = rules
            .rewrite("/assets/index-1.css", b"body{}")
            .unwrap();
        assert_eq!(text(body), "body{} #new-chat-button {display: none;}");
    }

    #[test]
    fn chainlit_settings_prefix_public() {
        let rules = rules(FrameworkKind::Chainlit);
        let (pattern, body) = rules
            .rewrite("/project/settings", br#"{"logo":"/public/logo.png"}"#)
            .unwrap();
        assert_eq!(pattern, "*settings");
        assert_eq!(text(body), r#"{"logo":"/driver-proxy/o/1/abc/7860/public/logo.png"}"#);
    }

    #[test]
    fn arize_phoenix_rules_are_ordered() {
        let rules = rules(FrameworkKind::ArizePhoenix);
        assert_eq!(rules.find("/").unwrap().pattern(), "/");
        assert_eq!(rules.find("/projects/abc").unwrap().pattern(), "/projects/*");
        assert_eq!(rules.find("/static/index.js").unwrap().pattern(), "*/index.js");

        let (_, body) = rules
            .rewrite("/static/index.js", br#"post("/graphql");nav("/projects")"#)
            .unwrap();
        assert_eq!(
            text(body),
            r#"post("/driver-proxy/o/1/abc/7860/graphql");nav("/driver-proxy/o/1/abc/7860/projects")"#
        );
    }
}
