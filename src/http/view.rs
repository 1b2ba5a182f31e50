//! Markup for host pages: the consent banner and the consented scripts.

use askama::Template;
use tracing::warn;

use crate::config::{BannerStyle, BannerText, CategoryConfig, ConsentConfig};
use crate::error::AppError;

use super::{ConsentContext, ROUTE_PREFIX};

#[derive(Template)]
#[template(path = "cookie_banner.html")]
struct BannerTemplate<'a> {
    position: &'a str,
    style: &'a BannerStyle,
    text: BannerText,
    customizable: bool,
    categories: Vec<&'a CategoryConfig>,
    policy_link: Option<&'a str>,
    more_link: Option<&'a str>,
    stylesheet_url: Option<&'a str>,
    script_url: Option<&'a str>,
    endpoint: &'a str,
    cookie_name: &'a str,
    bar_timeout_ms: u64,
    locale: &'a str,
}

#[derive(Template)]
#[template(source = r#"<script src="{{ src }}"></script>"#, ext = "html")]
struct ScriptTag<'a> {
    src: &'a str,
}

#[derive(Template)]
#[template(path = "cookie_policy.html")]
struct PolicyTemplate<'a> {
    title: &'a str,
    categories: &'a [CategoryConfig],
    cookie_name: &'a str,
    expiration_days: u64,
    locale: &'a str,
}

/// Banner and customise modal, or an empty string when the layer is off,
/// the visitor is outside the target regions or has already decided.
///
/// Without a context (middleware not mounted) the banner is shown.
pub fn render_banner(ctx: Option<&ConsentContext>, config: &ConsentConfig) -> String {
    if !config.enabled {
        return String::new();
    }
    if ctx.is_some_and(|c| !c.in_target_region || c.consent_given) {
        return String::new();
    }
    let locale = ctx.map_or(config.multilingual.fallback_locale.as_str(), |c| c.locale.as_str());
    let banner = &config.banner;
    let template = BannerTemplate {
        position: banner.position.as_str(),
        style: &banner.style,
        text: banner.text_for(locale),
        customizable: banner.customizable,
        categories: config.optional_categories().collect(),
        policy_link: banner.cookie_policy_link.as_deref(),
        more_link: banner.more_link.as_deref(),
        stylesheet_url: banner.stylesheet_url.as_deref(),
        script_url: banner.script_url.as_deref(),
        endpoint: ROUTE_PREFIX,
        cookie_name: &config.cookie.name,
        bar_timeout_ms: banner.bar_timeout_ms,
        locale,
    };
    template.render().unwrap_or_else(|e| {
        warn!("cookie banner render failed: {e}");
        String::new()
    })
}

/// The consented scripts, in order. URLs (`http…` or `/…`) become
/// `<script src>` tags; anything else is inline markup emitted as is.
pub fn render_scripts(ctx: Option<&ConsentContext>) -> String {
    let Some(ctx) = ctx else {
        return String::new();
    };
    let mut out = String::new();
    for script in &ctx.scripts {
        if script.starts_with("http") || script.starts_with('/') {
            match (ScriptTag { src: script }).render() {
                Ok(tag) => out.push_str(&tag),
                Err(e) => warn!("script tag render failed: {e}"),
            }
        } else {
            out.push_str(script);
        }
    }
    out
}

/// Generated cookie policy page listing every category with its cookies
/// and services.
pub fn render_policy(config: &ConsentConfig, locale: &str) -> Result<String, AppError> {
    PolicyTemplate {
        title: "Cookie Policy",
        categories: &config.categories,
        cookie_name: &config.cookie.name,
        expiration_days: config.cookie.expiration / 86_400,
        locale,
    }
    .render()
    .map_err(|e| AppError::Template(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::consent::ConsentMap;
    use crate::geo::Region;

    fn ctx(in_target: bool, given: bool) -> ConsentContext {
        ConsentContext {
            region: Region::Eu,
            in_target_region: in_target,
            consent_given: given,
            consent: ConsentMap::new(),
            scripts: Vec::new(),
            locale: "en_US".into(),
        }
    }

    #[test]
    fn banner_hidden_when_decided_or_out_of_region() {
        let config = Config::test_default().consent;
        assert!(render_banner(Some(&ctx(true, true)), &config).is_empty());
        assert!(render_banner(Some(&ctx(false, false)), &config).is_empty());
        assert!(!render_banner(Some(&ctx(true, false)), &config).is_empty());
        assert!(!render_banner(None, &config).is_empty());
    }

    #[test]
    fn banner_hidden_when_disabled() {
        let mut config = Config::test_default().consent;
        config.enabled = false;
        assert!(render_banner(Some(&ctx(true, false)), &config).is_empty());
    }

    #[test]
    fn banner_lists_optional_categories_only() {
        let config = Config::test_default().consent;
        let html = render_banner(Some(&ctx(true, false)), &config);
        assert!(html.contains(r#"id="cookie-consent-banner""#));
        assert!(html.contains(r#"name="statistics""#));
        assert!(html.contains(r#"name="marketing""#));
        assert!(!html.contains(r#"name="essential""#));
        assert!(html.contains("cookie-consent.css"));
        assert!(html.contains("cookie-consent.js"));
    }

    #[test]
    fn banner_escapes_text() {
        let mut config = Config::test_default().consent;
        config.banner.text.message = "<b>cookies</b> & more".into();
        let html = render_banner(None, &config);
        assert!(html.contains("&lt;b&gt;cookies&lt;/b&gt; &amp; more"));
        assert!(!html.contains("<b>cookies</b>"));
    }

    #[test]
    fn banner_without_customize_has_no_modal() {
        let mut config = Config::test_default().consent;
        config.banner.customizable = false;
        let html = render_banner(None, &config);
        assert!(!html.contains("cookie-consent-modal"));
    }

    #[test]
    fn scripts_split_urls_from_inline() {
        let mut c = ctx(true, true);
        c.scripts = vec![
            "https://cdn.example.com/a.js".into(),
            "/local.js".into(),
            "<script>inline()</script>".into(),
        ];
        let out = render_scripts(Some(&c));
        assert_eq!(out.matches("<script src=").count(), 2);
        assert!(out.contains("cdn.example.com"));
        assert!(out.find("cdn.example.com") < out.find("local.js"));
        assert!(out.ends_with("<script>inline()</script>"));
        assert!(render_scripts(None).is_empty());
    }

    #[test]
    fn policy_lists_categories_and_cookies() {
        let config = Config::test_default().consent;
        let html = render_policy(&config, "en_US").unwrap();
        assert!(html.contains("STATISTICS"));
        assert!(html.contains("_ga"));
        assert!(html.contains("365 days"));
    }
}
