use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Record, Table};

use crate::error::{SIBLING_SLUG_CONSTRAINT, SITE_ROOT_CONSTRAINT};

pub const ROOT_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Home,
    Standard,
    ServiceIndex,
    Service,
    BlogIndex,
    BlogPost,
    DoctorIndex,
    Contact,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Home => "home",
            PageKind::Standard => "standard",
            PageKind::ServiceIndex => "service_index",
            PageKind::Service => "service",
            PageKind::BlogIndex => "blog_index",
            PageKind::BlogPost => "blog_post",
            PageKind::DoctorIndex => "doctor_index",
            PageKind::Contact => "contact",
        }
    }

    pub fn template(&self) -> String {
        format!("{}.html", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Draft,
    Live,
    LiveWithDraftChanges,
}

/// Editable content of a page. Kind-specific fields stay empty for kinds
/// that do not use them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub title: String,
    #[serde(default)]
    pub intro: String,
    /// Markdown.
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PageContent {
    pub fn titled(title: &str, intro: &str) -> Self {
        Self {
            title: title.to_string(),
            intro: intro.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    /// `None` only for the site root.
    pub parent_id: Option<Uuid>,
    pub slug: String,
    pub kind: PageKind,
    pub sort_order: i32,
    pub show_in_menus: bool,
    pub url_path: String,
    pub depth: u32,
    pub draft: PageContent,
    pub live: Option<PageContent>,
    pub status: PageStatus,
    pub first_published_at: Option<DateTime<Utc>>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn table() -> Table<Page> {
        Table::new("pages")
            .unique(SIBLING_SLUG_CONSTRAINT, |p: &Page| {
                p.parent_id.map(|parent| format!("{}/{}", parent, p.slug))
            })
            .unique(SITE_ROOT_CONSTRAINT, |p: &Page| p.parent_id.is_none().then(|| "root".to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Whether `self` sits strictly below `ancestor` in the tree.
    pub fn is_descendant_of(&self, ancestor: &Page) -> bool {
        self.id != ancestor.id && self.url_path.starts_with(&ancestor.url_path)
    }

    pub fn title(&self) -> &str {
        self.live.as_ref().map_or(&self.draft.title, |live| &live.title)
    }
}

impl Record for Page {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Path of a child page under `parent_path`.
pub fn child_path(parent_path: &str, slug: &str) -> String {
    format!("{}{}/", parent_path, slug)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePageRequest {
    pub parent_id: Uuid,
    pub slug: String,
    pub kind: PageKind,
    #[serde(flatten)]
    pub content: PageContent,
    pub sort_order: Option<i32>,
    pub show_in_menus: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePageRequest {
    pub slug: Option<String>,
    pub content: Option<PageContent>,
    pub sort_order: Option<i32>,
    pub show_in_menus: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovePageRequest {
    pub parent_id: Uuid,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub title: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(parent_id: Option<Uuid>, url_path: &str) -> Page {
        let now = Utc::now();
        Page {
            id: Uuid::new_v4(),
            parent_id,
            slug: "x".to_string(),
            kind: PageKind::Standard,
            sort_order: 0,
            show_in_menus: false,
            url_path: url_path.to_string(),
            depth: 0,
            draft: PageContent::titled("Draft", ""),
            live: None,
            status: PageStatus::Draft,
            first_published_at: None,
            last_published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn child_paths_end_with_a_slash() {
        assert_eq!(child_path(ROOT_PATH, "blog"), "/blog/");
        assert_eq!(child_path("/blog/", "first-post"), "/blog/first-post/");
    }

    #[test]
    fn descendants_share_the_path_prefix() {
        let root = page(None, "/");
        let blog = page(Some(root.id), "/blog/");
        let post = page(Some(blog.id), "/blog/hello/");
        let lookalike = page(Some(root.id), "/blogroll/");

        assert!(post.is_descendant_of(&blog));
        assert!(post.is_descendant_of(&root));
        assert!(!blog.is_descendant_of(&blog));
        assert!(!lookalike.is_descendant_of(&blog));
    }

    #[test]
    fn title_prefers_live_content() {
        let mut p = page(None, "/");
        assert_eq!(p.title(), "Draft");
        p.live = Some(PageContent::titled("Live", ""));
        assert_eq!(p.title(), "Live");
    }

    #[test]
    fn kinds_map_to_templates() {
        assert_eq!(PageKind::BlogIndex.template(), "blog_index.html");
        let kind: PageKind = serde_json::from_str("\"doctor_index\"").unwrap();
        assert_eq!(kind, PageKind::DoctorIndex);
    }
}
