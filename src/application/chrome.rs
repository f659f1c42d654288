use time::OffsetDateTime;

use crate::domain::entities::UserRecord;
use crate::presentation::views::{
    self, BrandView, FooterView, LayoutChrome, NavigationLinkView, NavigationView, PageMetaView,
};

const BRAND_TITLE: &str = "Yatube";

/// Builds the layout shared by every page for the current viewer.
#[derive(Clone, Debug)]
pub struct ChromeService {
    login_url: String,
}

impl ChromeService {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
        }
    }

    pub fn for_viewer(&self, viewer: Option<&UserRecord>) -> LayoutChrome {
        let mut entries = vec![link("Main page", "/")];
        match viewer {
            Some(user) => {
                entries.push(link("Following", "/follow/"));
                entries.push(link("New post", "/create/"));
                entries.push(link("My profile", &views::profile_href(&user.username)));
            }
            None => entries.push(link("Log in", &self.login_url)),
        }

        LayoutChrome {
            brand: BrandView {
                title: BRAND_TITLE.to_string(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            footer: FooterView {
                year: OffsetDateTime::now_utc().year(),
            },
            meta: PageMetaView {
                title: BRAND_TITLE.to_string(),
            },
        }
    }
}

fn link(label: &str, href: &str) -> NavigationLinkView {
    NavigationLinkView {
        label: label.to_string(),
        href: href.to_string(),
    }
}
