//! Google Tag Manager container, gated on `marketing` consent.

use crate::config::GoogleConfig;
use crate::consent::{ConsentMap, CookieBlocker};

use super::{ScriptIntegration, checked_tag_id};

const CATEGORY: &str = "marketing";

#[derive(Debug, Clone)]
pub struct GtmIntegration {
    enabled: bool,
    container_id: Option<String>,
}

impl GtmIntegration {
    pub fn new(google: &GoogleConfig) -> Self {
        Self {
            enabled: google.enable_gtm,
            container_id: google.gtm_id.clone(),
        }
    }
}

impl ScriptIntegration for GtmIntegration {
    fn id(&self) -> &str {
        "gtm"
    }

    fn render(&self, consent: &ConsentMap) -> Option<String> {
        if !self.enabled || !CookieBlocker::new(consent).allow(CATEGORY) {
            return None;
        }
        let id = checked_tag_id(self.id(), self.container_id.as_deref())?;
        Some(format!(
            r#"<!-- Google Tag Manager -->
<script>
(function(w,d,s,l,i){{w[l]=w[l]||[];w[l].push({{'gtm.start':
new Date().getTime(),event:'gtm.js'}});var f=d.getElementsByTagName(s)[0],
j=d.createElement(s),dl=l!='dataLayer'?'&l='+l:'';j.async=true;j.src=
'https://www.googletagmanager.com/gtm.js?id='+i+dl;f.parentNode.insertBefore(j,f);
}})(window,document,'script','dataLayer','{id}');
</script>
<!-- End Google Tag Manager -->"#
        ))
    }
}
