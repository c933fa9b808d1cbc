use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::DoctorService;
use shared_config::AppConfig;
use shared_database::Table;
use shared_models::auth::{Role, User};

use crate::services::cache::PageCache;
use crate::services::templates::SiteTemplates;
use crate::{
    child_path, ContentError, CreatePageRequest, MovePageRequest, Page, PageContent, PageKind, PageStatus,
    UpdatePageRequest, ROOT_PATH,
};

const ROOT_SLUG: &str = "home";

pub fn is_valid_slug(slug: &str) -> bool {
    static SLUG: OnceLock<Option<Regex>> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").ok())
        .as_ref()
        .map_or(false, |pattern| pattern.is_match(slug))
}

fn check_slug(slug: &str) -> Result<(), ContentError> {
    if !is_valid_slug(slug) {
        return Err(ContentError::invalid(
            "slug",
            "Slugs may only contain lowercase letters, digits and hyphens",
        ));
    }
    Ok(())
}

fn check_title(content: &PageContent) -> Result<(), ContentError> {
    if content.title.trim().is_empty() {
        return Err(ContentError::invalid("title", "Title is required"));
    }
    Ok(())
}

pub struct PageService {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) pages: Arc<Table<Page>>,
    pub(crate) doctors: Arc<DoctorService>,
    pub(crate) cache: PageCache,
    pub(crate) templates: SiteTemplates,
}

impl PageService {
    pub fn new(config: Arc<AppConfig>, pages: Arc<Table<Page>>, doctors: Arc<DoctorService>) -> Result<Self, ContentError> {
        let cache = PageCache::new(Duration::from_secs(config.page_cache_ttl_seconds));
        Ok(Self {
            config,
            pages,
            doctors,
            cache,
            templates: SiteTemplates::new()?,
        })
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    fn ensure_editor(&self, user: &User) -> Result<(), ContentError> {
        if matches!(user.role, Role::Admin | Role::Staff) {
            return Ok(());
        }
        warn!("User {} with role {} attempted to edit pages", user.id, user.role);
        Err(ContentError::Forbidden("Only admins and staff can manage pages".to_string()))
    }

    pub async fn root(&self) -> Option<Page> {
        self.pages.find(|p| p.is_root()).await
    }

    pub async fn get(&self, user: &User, id: Uuid) -> Result<Page, ContentError> {
        self.ensure_editor(user)?;
        Ok(self.pages.require(id).await?)
    }

    /// Children of `parent_id` in menu order.
    pub async fn children_of(&self, parent_id: Uuid) -> Vec<Page> {
        let mut children = self.pages.filter(|p| p.parent_id == Some(parent_id)).await;
        children.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.slug.cmp(&b.slug)));
        children
    }

    /// Every page, depth-first with siblings in menu order.
    pub async fn tree(&self, user: &User) -> Result<Vec<Page>, ContentError> {
        self.ensure_editor(user)?;

        let mut by_parent: HashMap<Option<Uuid>, Vec<Page>> = HashMap::new();
        for page in self.pages.all().await {
            by_parent.entry(page.parent_id).or_default().push(page);
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.slug.cmp(&b.slug)));
        }

        let mut ordered = Vec::new();
        let mut stack: Vec<Page> = by_parent.remove(&None).unwrap_or_default();
        stack.reverse();
        while let Some(page) = stack.pop() {
            if let Some(mut children) = by_parent.remove(&Some(page.id)) {
                children.reverse();
                stack.extend(children);
            }
            ordered.push(page);
        }
        Ok(ordered)
    }

    pub async fn create(&self, user: &User, request: CreatePageRequest) -> Result<Page, ContentError> {
        self.ensure_editor(user)?;
        check_slug(&request.slug)?;
        check_title(&request.content)?;
        if request.kind == PageKind::Home {
            return Err(ContentError::invalid("kind", "Only the site root can be a home page"));
        }

        let parent = self
            .pages
            .get(request.parent_id)
            .await
            .ok_or_else(|| ContentError::invalid("parent_id", format!("Page {} does not exist", request.parent_id)))?;

        let sort_order = match request.sort_order {
            Some(order) => order,
            None => self.pages.count(|p| p.parent_id == Some(parent.id)).await as i32,
        };

        let now = Utc::now();
        let page = self
            .pages
            .insert(Page {
                id: Uuid::new_v4(),
                parent_id: Some(parent.id),
                url_path: child_path(&parent.url_path, &request.slug),
                slug: request.slug,
                kind: request.kind,
                sort_order,
                show_in_menus: request.show_in_menus.unwrap_or(false),
                depth: parent.depth + 1,
                draft: request.content,
                live: None,
                status: PageStatus::Draft,
                first_published_at: None,
                last_published_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Created draft page {} at {}", page.id, page.url_path);
        Ok(page)
    }

    pub async fn update(&self, user: &User, id: Uuid, request: UpdatePageRequest) -> Result<Page, ContentError> {
        self.ensure_editor(user)?;
        if let Some(content) = &request.content {
            check_title(content)?;
        }

        let current = self.pages.require(id).await?;
        if let Some(slug) = request.slug.as_deref().filter(|s| *s != current.slug) {
            check_slug(slug)?;
            match current.parent_id {
                Some(parent_id) => self.relocate(&current, parent_id, slug).await?,
                None => return Err(ContentError::invalid("slug", "The site root cannot be renamed")),
            };
        }

        let touches_site = request.sort_order.is_some() || request.show_in_menus.is_some();
        let page = self
            .pages
            .update(id, |page| {
                if let Some(content) = request.content {
                    page.draft = content;
                    if page.status == PageStatus::Live {
                        page.status = PageStatus::LiveWithDraftChanges;
                    }
                }
                if let Some(order) = request.sort_order {
                    page.sort_order = order;
                }
                if let Some(show) = request.show_in_menus {
                    page.show_in_menus = show;
                }
                page.updated_at = Utc::now();
            })
            .await?;

        if touches_site || request.slug.is_some() {
            self.cache.clear().await;
        }
        info!("Updated page {}", page.id);
        Ok(page)
    }

    pub async fn publish(&self, user: &User, id: Uuid) -> Result<Page, ContentError> {
        self.ensure_editor(user)?;
        let page = self
            .pages
            .update(id, |page| {
                let now = Utc::now();
                page.live = Some(page.draft.clone());
                page.status = PageStatus::Live;
                page.first_published_at.get_or_insert(now);
                page.last_published_at = Some(now);
                page.updated_at = now;
            })
            .await?;

        self.cache.clear().await;
        info!("Published page {} at {}", page.id, page.url_path);
        Ok(page)
    }

    pub async fn unpublish(&self, user: &User, id: Uuid) -> Result<Page, ContentError> {
        self.ensure_editor(user)?;
        let page = self
            .pages
            .update(id, |page| {
                page.live = None;
                page.status = PageStatus::Draft;
                page.updated_at = Utc::now();
            })
            .await?;

        self.cache.clear().await;
        info!("Unpublished page {} at {}", page.id, page.url_path);
        Ok(page)
    }

    pub async fn move_page(&self, user: &User, id: Uuid, request: MovePageRequest) -> Result<Page, ContentError> {
        self.ensure_editor(user)?;
        let page = self.pages.require(id).await?;
        if page.is_root() {
            return Err(ContentError::invalid("parent_id", "The site root cannot be moved"));
        }

        let target = self
            .pages
            .get(request.parent_id)
            .await
            .ok_or_else(|| ContentError::invalid("parent_id", format!("Page {} does not exist", request.parent_id)))?;
        if target.id == page.id || target.is_descendant_of(&page) {
            return Err(ContentError::invalid("parent_id", "A page cannot be moved below itself"));
        }

        let moved = self.relocate(&page, target.id, &page.slug).await?;
        let moved = match request.sort_order {
            Some(order) => self.pages.update(moved.id, |p| p.sort_order = order).await?,
            None => moved,
        };

        self.cache.clear().await;
        info!("Moved page {} to {}", moved.id, moved.url_path);
        Ok(moved)
    }

    /// Re-parents or renames `page`, then rewrites the url path and depth of
    /// every page below it.
    async fn relocate(&self, page: &Page, parent_id: Uuid, slug: &str) -> Result<Page, ContentError> {
        let parent = self.pages.require(parent_id).await?;
        let old_path = page.url_path.clone();
        let new_path = child_path(&parent.url_path, slug);
        let new_depth = parent.depth + 1;

        let moved = self
            .pages
            .update(page.id, |p| {
                p.parent_id = Some(parent.id);
                p.slug = slug.to_string();
                p.url_path = new_path.clone();
                p.depth = new_depth;
                p.updated_at = Utc::now();
            })
            .await?;

        let descendants = self
            .pages
            .filter(|p| p.id != page.id && p.url_path.starts_with(&old_path))
            .await;
        for descendant in &descendants {
            let rest = &descendant.url_path[old_path.len()..];
            let url_path = format!("{}{}", new_path, rest);
            let depth = descendant.depth + new_depth - page.depth;
            self.pages
                .update(descendant.id, |p| {
                    p.url_path = url_path;
                    p.depth = depth;
                })
                .await?;
        }

        debug!(
            "Relocated {} from {} to {} with {} descendants",
            page.id,
            old_path,
            new_path,
            descendants.len()
        );
        Ok(moved)
    }

    /// Deletes the page and everything below it.
    pub async fn delete(&self, user: &User, id: Uuid) -> Result<usize, ContentError> {
        self.ensure_editor(user)?;
        let page = self.pages.require(id).await?;
        if page.is_root() {
            return Err(ContentError::invalid("page", "The site root cannot be deleted"));
        }

        let prefix = page.url_path.clone();
        let removed = self.pages.delete_where(|p| p.url_path.starts_with(&prefix)).await?;
        self.cache.clear().await;
        info!("Deleted {} pages under {}", removed.len(), prefix);
        Ok(removed.len())
    }

    /// Creates the default site on first start. Returns false when a root
    /// page already exists.
    pub async fn seed_site(&self) -> Result<bool, ContentError> {
        if self.root().await.is_some() {
            debug!("Page tree already seeded");
            return Ok(false);
        }

        let now = Utc::now();
        let published = |content: PageContent| Page {
            id: Uuid::new_v4(),
            parent_id: None,
            slug: String::new(),
            kind: PageKind::Standard,
            sort_order: 0,
            show_in_menus: true,
            url_path: String::new(),
            depth: 0,
            live: Some(content.clone()),
            draft: content,
            status: PageStatus::Live,
            first_published_at: Some(now),
            last_published_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        let mut home_content = PageContent::titled(&self.config.site_name, "Caring for you and your family");
        home_content.body = format!("Welcome to {}.", self.config.site_name);
        let home = self
            .pages
            .insert(Page {
                slug: ROOT_SLUG.to_string(),
                kind: PageKind::Home,
                show_in_menus: false,
                url_path: ROOT_PATH.to_string(),
                ..published(home_content)
            })
            .await?;

        let mut contact = PageContent::titled("Contact", "Get in touch with our front desk");
        contact.email = Some(self.config.default_from_email.clone());

        let sections = [
            (
                "services",
                PageKind::ServiceIndex,
                PageContent::titled("Our Services", "Explore our wide range of medical services"),
            ),
            (
                "blog",
                PageKind::BlogIndex,
                PageContent::titled("Blog", "Stay updated with our latest medical insights"),
            ),
            (
                "doctors",
                PageKind::DoctorIndex,
                PageContent::titled("Our Doctors", "Meet our experienced medical professionals"),
            ),
            ("contact", PageKind::Contact, contact),
        ];

        for (order, (slug, kind, content)) in sections.into_iter().enumerate() {
            self.pages
                .insert(Page {
                    parent_id: Some(home.id),
                    slug: slug.to_string(),
                    kind,
                    sort_order: order as i32,
                    url_path: child_path(ROOT_PATH, slug),
                    depth: 1,
                    ..published(content)
                })
                .await?;
        }

        info!("Seeded the page tree with a home page and 4 sections");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_words_and_hyphens() {
        assert!(is_valid_slug("our-services"));
        assert!(is_valid_slug("covid-19"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Our-Services"));
        assert!(!is_valid_slug("a/b"));
        assert!(!is_valid_slug("with space"));
    }
}
