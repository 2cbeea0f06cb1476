//! Website content model: one aggregate document keyed by section.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SyncError;

/// The eleven known top-level sections of the website document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    Header,
    Hero,
    About,
    Services,
    Products,
    Portfolio,
    Team,
    Blog,
    Testimonials,
    Contact,
    Footer,
}

impl SectionKey {
    pub const ALL: [SectionKey; 11] = [
        SectionKey::Header,
        SectionKey::Hero,
        SectionKey::About,
        SectionKey::Services,
        SectionKey::Products,
        SectionKey::Portfolio,
        SectionKey::Team,
        SectionKey::Blog,
        SectionKey::Testimonials,
        SectionKey::Contact,
        SectionKey::Footer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Header => "header",
            SectionKey::Hero => "hero",
            SectionKey::About => "about",
            SectionKey::Services => "services",
            SectionKey::Products => "products",
            SectionKey::Portfolio => "portfolio",
            SectionKey::Team => "team",
            SectionKey::Blog => "blog",
            SectionKey::Testimonials => "testimonials",
            SectionKey::Contact => "contact",
            SectionKey::Footer => "footer",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        SectionKey::ALL.into_iter().find(|key| key.as_str() == s)
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatTile {
    pub value: String,
    pub label: String,
}

/// An icon + title + blurb tile, used by several sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureItem {
    pub icon: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Testimonial {
    pub name: String,
    pub role: String,
    pub company: String,
    pub quote: String,
    pub rating: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderSection {
    pub logo_text: String,
    pub logo_url: String,
    pub nav_links: Vec<NavLink>,
    pub cta_text: String,
    pub cta_link: String,
    pub show_cta: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroSection {
    pub badge: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub primary_cta_text: String,
    pub primary_cta_link: String,
    pub secondary_cta_text: String,
    pub secondary_cta_link: String,
    pub background_image: String,
    pub stats: Vec<StatTile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AboutSection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub mission: String,
    pub vision: String,
    pub image: String,
    pub features: Vec<FeatureItem>,
    pub stats: Vec<StatTile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicesSection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub items: Vec<FeatureItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductsSection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub show_pricing: bool,
    pub items: Vec<FeatureItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortfolioSection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub show_filters: bool,
    pub items_per_page: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamSection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub show_social: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogSection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub posts_per_page: u32,
    pub show_author: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestimonialsSection {
    pub title: String,
    pub subtitle: String,
    pub autoplay: bool,
    pub interval_seconds: u32,
    pub items: Vec<Testimonial>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactSection {
    pub title: String,
    pub subtitle: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub hours: String,
    pub map_embed_url: String,
    pub show_form: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FooterSection {
    pub description: String,
    pub copyright: String,
    pub links: Vec<NavLink>,
    pub social_links: Vec<SocialLink>,
    pub newsletter_enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The whole website document. Every known section is always populated;
/// unknown top-level keys are kept in `extensions`, and fields a section
/// carries beyond its schema are kept in that section's `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteContent {
    pub header: HeaderSection,
    pub hero: HeroSection,
    pub about: AboutSection,
    pub services: ServicesSection,
    pub products: ProductsSection,
    pub portfolio: PortfolioSection,
    pub team: TeamSection,
    pub blog: BlogSection,
    pub testimonials: TestimonialsSection,
    pub contact: ContactSection,
    pub footer: FooterSection,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

fn link(label: &str, href: &str) -> NavLink {
    NavLink {
        label: label.to_string(),
        href: href.to_string(),
    }
}

fn stat(value: &str, label: &str) -> StatTile {
    StatTile {
        value: value.to_string(),
        label: label.to_string(),
    }
}

fn feature(icon: &str, title: &str, description: &str) -> FeatureItem {
    FeatureItem {
        icon: icon.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        highlights: Vec::new(),
    }
}

impl WebsiteContent {
    /// The seeded content every load starts from.
    pub fn defaults() -> Self {
        Self {
            header: HeaderSection {
                logo_text: "Northlight Digital".to_string(),
                logo_url: "/logo.svg".to_string(),
                nav_links: vec![
                    link("Home", "/"),
                    link("Services", "/services"),
                    link("Products", "/products"),
                    link("Portfolio", "/portfolio"),
                    link("Blog", "/blog"),
                    link("Contact", "/contact"),
                ],
                cta_text: "Start a project".to_string(),
                cta_link: "/contact".to_string(),
                show_cta: true,
                extra: Map::new(),
            },
            hero: HeroSection {
                badge: "Digital agency".to_string(),
                title: "We build websites that work as hard as you do".to_string(),
                subtitle: "Design, development and growth for small businesses".to_string(),
                description: "From first sketch to launch day and beyond, we ship fast, \
                              accessible sites backed by measurable results."
                    .to_string(),
                primary_cta_text: "Get a quote".to_string(),
                primary_cta_link: "/contact".to_string(),
                secondary_cta_text: "See our work".to_string(),
                secondary_cta_link: "/portfolio".to_string(),
                background_image: String::new(),
                stats: vec![
                    stat("120+", "Projects delivered"),
                    stat("98%", "Client retention"),
                    stat("8", "Years in business"),
                ],
                extra: Map::new(),
            },
            about: AboutSection {
                title: "About us".to_string(),
                subtitle: "A small team with a big toolbox".to_string(),
                description: "We are designers and engineers who care about craft.".to_string(),
                mission: "Make great web presence affordable.".to_string(),
                vision: "Every small business online, done right.".to_string(),
                image: String::new(),
                features: vec![
                    feature("zap", "Fast delivery", "Most sites launch within six weeks."),
                    feature("shield", "Reliable", "Hosting and maintenance included."),
                ],
                stats: vec![stat("15", "Team members")],
                extra: Map::new(),
            },
            services: ServicesSection {
                title: "Services".to_string(),
                subtitle: "Everything you need to grow online".to_string(),
                description: String::new(),
                items: vec![
                    feature("code", "Web development", "Custom sites and web apps."),
                    feature("pen", "Brand design", "Logos, identity and style guides."),
                    feature("trending-up", "SEO & growth", "Get found and convert visitors."),
                ],
                extra: Map::new(),
            },
            products: ProductsSection {
                title: "Products".to_string(),
                subtitle: "Ready-made packages".to_string(),
                description: String::new(),
                show_pricing: true,
                items: Vec::new(),
                extra: Map::new(),
            },
            portfolio: PortfolioSection {
                title: "Portfolio".to_string(),
                subtitle: "Selected work".to_string(),
                description: String::new(),
                show_filters: true,
                items_per_page: 9,
                extra: Map::new(),
            },
            team: TeamSection {
                title: "Our team".to_string(),
                subtitle: "The people behind the pixels".to_string(),
                description: String::new(),
                show_social: true,
                extra: Map::new(),
            },
            blog: BlogSection {
                title: "Blog".to_string(),
                subtitle: "Notes on design, code and growth".to_string(),
                description: String::new(),
                posts_per_page: 6,
                show_author: true,
                extra: Map::new(),
            },
            testimonials: TestimonialsSection {
                title: "What clients say".to_string(),
                subtitle: String::new(),
                autoplay: true,
                interval_seconds: 6,
                items: Vec::new(),
                extra: Map::new(),
            },
            contact: ContactSection {
                title: "Contact".to_string(),
                subtitle: "Tell us about your project".to_string(),
                email: "hello@example.com".to_string(),
                phone: String::new(),
                address: String::new(),
                hours: "Mon-Fri 9:00-17:00".to_string(),
                map_embed_url: String::new(),
                show_form: true,
                extra: Map::new(),
            },
            footer: FooterSection {
                description: "Websites for small businesses.".to_string(),
                copyright: "All rights reserved.".to_string(),
                links: vec![link("Privacy", "/privacy"), link("Terms", "/terms")],
                social_links: Vec::new(),
                newsletter_enabled: false,
                extra: Map::new(),
            },
            extensions: BTreeMap::new(),
        }
    }

    /// Serialize one known section.
    pub fn section_value(&self, key: SectionKey) -> Result<Value, SyncError> {
        let value = match key {
            SectionKey::Header => serde_json::to_value(&self.header)?,
            SectionKey::Hero => serde_json::to_value(&self.hero)?,
            SectionKey::About => serde_json::to_value(&self.about)?,
            SectionKey::Services => serde_json::to_value(&self.services)?,
            SectionKey::Products => serde_json::to_value(&self.products)?,
            SectionKey::Portfolio => serde_json::to_value(&self.portfolio)?,
            SectionKey::Team => serde_json::to_value(&self.team)?,
            SectionKey::Blog => serde_json::to_value(&self.blog)?,
            SectionKey::Testimonials => serde_json::to_value(&self.testimonials)?,
            SectionKey::Contact => serde_json::to_value(&self.contact)?,
            SectionKey::Footer => serde_json::to_value(&self.footer)?,
        };
        Ok(value)
    }

    /// Replace one known section wholesale. Fields absent from `value`
    /// become empty, they are not taken from the previous section.
    pub fn set_section(&mut self, key: SectionKey, value: Value) -> Result<(), SyncError> {
        match key {
            SectionKey::Header => self.header = serde_json::from_value(value)?,
            SectionKey::Hero => self.hero = serde_json::from_value(value)?,
            SectionKey::About => self.about = serde_json::from_value(value)?,
            SectionKey::Services => self.services = serde_json::from_value(value)?,
            SectionKey::Products => self.products = serde_json::from_value(value)?,
            SectionKey::Portfolio => self.portfolio = serde_json::from_value(value)?,
            SectionKey::Team => self.team = serde_json::from_value(value)?,
            SectionKey::Blog => self.blog = serde_json::from_value(value)?,
            SectionKey::Testimonials => self.testimonials = serde_json::from_value(value)?,
            SectionKey::Contact => self.contact = serde_json::from_value(value)?,
            SectionKey::Footer => self.footer = serde_json::from_value(value)?,
        }
        Ok(())
    }

    /// Set any top-level key: known sections are type-checked, anything
    /// else lands in `extensions`.
    pub fn set_key(&mut self, key: &str, value: Value) -> Result<(), SyncError> {
        match SectionKey::from_key(key) {
            Some(section) => self.set_section(section, value),
            None => {
                self.extensions.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Current value of a top-level key, section or extension.
    pub fn key_value(&self, key: &str) -> Result<Option<Value>, SyncError> {
        match SectionKey::from_key(key) {
            Some(section) => self.section_value(section).map(Some),
            None => Ok(self.extensions.get(key).cloned()),
        }
    }

    pub fn to_map(&self) -> Result<Map<String, Value>, SyncError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(SyncError::Serialization(
                "content did not serialize to an object".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_populate_every_section() {
        let content = WebsiteContent::defaults();
        let map = content.to_map().unwrap();
        for key in SectionKey::ALL {
            let value = map.get(key.as_str()).expect("section missing");
            assert!(value.is_object(), "{} is not an object", key);
        }
        assert!(content.extensions.is_empty());
    }

    #[test]
    fn test_section_key_round_trip_names() {
        assert_eq!(SectionKey::from_key("testimonials"), Some(SectionKey::Testimonials));
        assert_eq!(SectionKey::from_key("Hero"), None);
        assert_eq!(SectionKey::from_key("pricing"), None);
    }

    #[test]
    fn test_set_section_replaces_wholesale() {
        let mut content = WebsiteContent::defaults();
        content
            .set_section(SectionKey::Hero, json!({ "title": "New" }))
            .unwrap();
        assert_eq!(content.hero.title, "New");
        assert_eq!(content.hero.subtitle, "");
        assert!(content.hero.stats.is_empty());
    }

    #[test]
    fn test_set_section_rejects_wrong_shape() {
        let mut content = WebsiteContent::defaults();
        let err = content
            .set_section(SectionKey::Hero, json!({ "stats": "lots" }))
            .unwrap_err();
        assert!(matches!(err, SyncError::Serialization(_)));
        assert_eq!(content.hero, WebsiteContent::defaults().hero);
    }

    #[test]
    fn test_unknown_keys_become_extensions() {
        let mut content = WebsiteContent::defaults();
        content.set_key("pricing", json!({ "tiers": 3 })).unwrap();
        let map = content.to_map().unwrap();
        assert_eq!(map["pricing"]["tiers"], 3);

        let parsed: WebsiteContent = serde_json::from_value(Value::Object(map)).unwrap();
        assert_eq!(parsed.extensions["pricing"], json!({ "tiers": 3 }));
    }

    #[test]
    fn test_section_keeps_fields_outside_schema() {
        let mut content = WebsiteContent::defaults();
        content
            .set_section(
                SectionKey::Hero,
                json!({ "title": "Remote", "videoUrl": "https://v", "layout": { "align": "left" } }),
            )
            .unwrap();
        assert_eq!(content.hero.title, "Remote");
        assert_eq!(content.hero.extra["videoUrl"], "https://v");

        let hero = content.section_value(SectionKey::Hero).unwrap();
        assert_eq!(hero["videoUrl"], "https://v");
        assert_eq!(hero["layout"]["align"], "left");
        assert!(hero.get("extra").is_none());
    }

    #[test]
    fn test_nested_object_under_known_section_survives() {
        let mut content = WebsiteContent::defaults();
        let mut about = content.key_value("about").unwrap().unwrap();
        about["gallery"] = json!({ "images": ["a.png"] });
        content.set_key("about", about).unwrap();

        let map = content.to_map().unwrap();
        assert_eq!(map["about"]["gallery"]["images"], json!(["a.png"]));
        assert_eq!(map["about"]["title"], "About us");
    }
}
