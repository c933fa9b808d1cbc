use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use doctor_cell::DoctorQuery;

use crate::services::templates::markdown_to_html;
use crate::{ContentError, MenuItem, Page, PageContent, PageKind, PageService};

#[derive(Debug, Serialize)]
struct PageContext {
    title: String,
    intro: String,
    body: String,
    kind: &'static str,
    url_path: String,
    department: Option<String>,
    icon: Option<String>,
    author: Option<String>,
    tags: Vec<String>,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    published: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChildSummary {
    title: String,
    intro: String,
    url: String,
    department: Option<String>,
    icon: Option<String>,
    author: Option<String>,
    published: Option<String>,
}

#[derive(Debug, Serialize)]
struct DoctorEntry {
    name: String,
    qualification: String,
    experience_years: u32,
    specializations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SiteContext<'a> {
    site_name: &'a str,
    year: i32,
    menu: Vec<MenuItem>,
    page: PageContext,
    children: Vec<ChildSummary>,
    doctors: Vec<DoctorEntry>,
}

#[derive(Debug, Serialize)]
struct NotFoundContext<'a> {
    site_name: &'a str,
    year: i32,
    menu: Vec<MenuItem>,
    path: &'a str,
}

/// `/blog` and `/blog/` name the same page.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

fn published_on(page: &Page) -> Option<String> {
    page.first_published_at.map(|at| at.format("%B %-d, %Y").to_string())
}

fn summary(page: &Page, content: &PageContent) -> ChildSummary {
    ChildSummary {
        title: content.title.clone(),
        intro: content.intro.clone(),
        url: page.url_path.clone(),
        department: content.department.clone(),
        icon: content.icon.clone(),
        author: content.author.clone(),
        published: published_on(page),
    }
}

impl PageService {
    /// Live children of the root that are flagged for menus.
    pub async fn menu(&self) -> Vec<MenuItem> {
        let Some(root) = self.root().await else {
            return Vec::new();
        };
        self.children_of(root.id)
            .await
            .into_iter()
            .filter(|p| p.show_in_menus)
            .filter_map(|p| {
                p.live.as_ref().map(|live| MenuItem {
                    title: live.title.clone(),
                    url: p.url_path.clone(),
                })
            })
            .collect()
    }

    /// Renders the live page at `path`, serving from the cache when possible.
    #[instrument(skip(self))]
    pub async fn render_path(&self, path: &str) -> Result<String, ContentError> {
        let path = normalize_path(path);
        if let Some(html) = self.cache.get(&path).await {
            return Ok(html);
        }
        let generation = self.cache.generation();

        let page = self
            .pages
            .find(|p| p.url_path == path && p.is_live())
            .await
            .ok_or_else(|| ContentError::PageNotFound(path.clone()))?;

        let html = self.render_page(&page).await?;
        self.cache.put(&path, html.clone(), generation).await;
        debug!("Rendered {} ({})", path, page.kind.as_str());
        Ok(html)
    }

    async fn render_page(&self, page: &Page) -> Result<String, ContentError> {
        let Some(content) = page.live.as_ref() else {
            return Err(ContentError::PageNotFound(page.url_path.clone()));
        };

        let mut live_children: Vec<(Page, PageContent)> = self
            .children_of(page.id)
            .await
            .into_iter()
            .filter_map(|child| child.live.clone().map(|live| (child, live)))
            .collect();
        if page.kind == PageKind::BlogIndex {
            live_children.retain(|(child, _)| child.kind == PageKind::BlogPost);
            live_children.sort_by(|(a, _), (b, _)| b.first_published_at.cmp(&a.first_published_at));
        }
        let children = live_children
            .iter()
            .map(|(child, live)| summary(child, live))
            .collect();

        let doctors = if page.kind == PageKind::DoctorIndex {
            self.doctors
                .list(&DoctorQuery::default())
                .await?
                .into_iter()
                .filter(|view| view.doctor.is_available)
                .map(|view| DoctorEntry {
                    name: view.full_name,
                    qualification: view.doctor.qualification,
                    experience_years: view.doctor.experience_years,
                    specializations: view.specializations.into_iter().map(|s| s.name).collect(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let context = SiteContext {
            site_name: &self.config.site_name,
            year: Utc::now().year(),
            menu: self.menu().await,
            page: PageContext {
                title: content.title.clone(),
                intro: content.intro.clone(),
                body: markdown_to_html(&content.body),
                kind: page.kind.as_str(),
                url_path: page.url_path.clone(),
                department: content.department.clone(),
                icon: content.icon.clone(),
                author: content.author.clone(),
                tags: content.tags.clone(),
                address: content.address.clone(),
                phone: content.phone.clone(),
                email: content.email.clone(),
                published: published_on(page),
            },
            children,
            doctors,
        };

        self.templates.render(&page.kind.template(), &context)
    }

    pub async fn render_not_found(&self, path: &str) -> Result<String, ContentError> {
        let context = NotFoundContext {
            site_name: &self.config.site_name,
            year: Utc::now().year(),
            menu: self.menu().await,
            path,
        };
        self.templates.render("404.html", &context)
    }
}
