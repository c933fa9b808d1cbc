use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;
use tera::{Context, Tera};

use crate::ContentError;

const TEMPLATES: &[(&str, &str)] = &[
    (
        "base.html",
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{% block title %}{{ page.title }}{% endblock title %} | {{ site_name }}</title>
</head>
<body class="{% block body_class %}page-{{ page.kind }}{% endblock body_class %}">
<header>
<a class="brand" href="/">{{ site_name }}</a>
<nav>
<ul>
{% for item in menu %}<li><a href="{{ item.url | safe }}">{{ item.title }}</a></li>
{% endfor %}</ul>
</nav>
</header>
<main>
{% block content %}{% endblock content %}
</main>
<footer><p>&copy; {{ year }} {{ site_name }}</p></footer>
</body>
</html>
"#,
    ),
    (
        "page_header.html",
        r#"<h1>{{ page.title }}</h1>
{% if page.intro %}<p class="intro">{{ page.intro }}</p>{% endif %}
"#,
    ),
    (
        "home.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
<div class="body">{{ page.body | safe }}</div>
{% if children %}<section class="sections">
{% for child in children %}<article><h2><a href="{{ child.url | safe }}">{{ child.title }}</a></h2><p>{{ child.intro }}</p></article>
{% endfor %}</section>{% endif %}
{% endblock content %}
"#,
    ),
    (
        "standard.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
<div class="body">{{ page.body | safe }}</div>
{% if children %}<ul class="subpages">
{% for child in children %}<li><a href="{{ child.url | safe }}">{{ child.title }}</a></li>
{% endfor %}</ul>{% endif %}
{% endblock content %}
"#,
    ),
    (
        "service_index.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
<div class="body">{{ page.body | safe }}</div>
<ul class="services">
{% if children %}{% for child in children %}<li>{% if child.icon %}<span class="icon">{{ child.icon }}</span> {% endif %}<a href="{{ child.url | safe }}">{{ child.title }}</a>{% if child.department %} <small>{{ child.department }}</small>{% endif %}<p>{{ child.intro }}</p></li>
{% endfor %}{% else %}<li>No services have been published yet.</li>
{% endif %}</ul>
{% endblock content %}
"#,
    ),
    (
        "service.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
{% if page.department %}<p class="department">Department: {{ page.department }}</p>{% endif %}
<div class="body">{{ page.body | safe }}</div>
{% endblock content %}
"#,
    ),
    (
        "blog_index.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
<div class="body">{{ page.body | safe }}</div>
{% if children %}{% for post in children %}<article class="post-summary">
<h2><a href="{{ post.url | safe }}">{{ post.title }}</a></h2>
<p class="meta">{% if post.published %}{{ post.published }}{% endif %}{% if post.author %} by {{ post.author }}{% endif %}</p>
<p>{{ post.intro }}</p>
</article>
{% endfor %}{% else %}<p>No posts yet.</p>
{% endif %}
{% endblock content %}
"#,
    ),
    (
        "blog_post.html",
        r#"{% extends "base.html" %}
{% block content %}
<article class="post">
{% include "page_header.html" %}
<p class="meta">{% if page.published %}{{ page.published }}{% endif %}{% if page.author %} by {{ page.author }}{% endif %}</p>
<div class="body">{{ page.body | safe }}</div>
{% if page.tags %}<ul class="tags">{% for tag in page.tags %}<li>{{ tag }}</li>{% endfor %}</ul>{% endif %}
</article>
{% endblock content %}
"#,
    ),
    (
        "doctor_index.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
<div class="body">{{ page.body | safe }}</div>
<ul class="doctors">
{% if doctors %}{% for doctor in doctors %}<li><h2>Dr. {{ doctor.name }}</h2>
<p>{{ doctor.qualification }}, {{ doctor.experience_years }} years of experience</p>
{% if doctor.specializations %}<p class="specializations">{{ doctor.specializations | join(sep=", ") }}</p>{% endif %}</li>
{% endfor %}{% else %}<li>Our doctor directory is being updated.</li>
{% endif %}</ul>
{% endblock content %}
"#,
    ),
    (
        "contact.html",
        r#"{% extends "base.html" %}
{% block content %}
{% include "page_header.html" %}
<div class="body">{{ page.body | safe }}</div>
<address>
{% if page.address %}<p>{{ page.address }}</p>{% endif %}
{% if page.phone %}<p>Phone: <a href="tel:{{ page.phone }}">{{ page.phone }}</a></p>{% endif %}
{% if page.email %}<p>Email: <a href="mailto:{{ page.email }}">{{ page.email }}</a></p>{% endif %}
</address>
{% endblock content %}
"#,
    ),
    (
        "404.html",
        r#"{% extends "base.html" %}
{% block title %}Page not found{% endblock title %}
{% block body_class %}page-not-found{% endblock body_class %}
{% block content %}
<h1>Page not found</h1>
<p>Nothing is published at <code>{{ path }}</code>.</p>
<p><a href="/">Return to the home page</a></p>
{% endblock content %}
"#,
    ),
];

/// Public site templates, one per page kind plus the 404 page. Page urls are
/// built from validated slugs and rendered unescaped.
pub struct SiteTemplates {
    tera: Tera,
}

impl SiteTemplates {
    pub fn new() -> Result<Self, ContentError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.autoescape_on(vec![".html"]);
        Ok(Self { tera })
    }

    pub fn render<C: Serialize>(&self, template: &str, context: &C) -> Result<String, ContentError> {
        let context = Context::from_serialize(context)?;
        Ok(self.tera.render(template, &context)?)
    }
}

/// Markdown to HTML. Raw HTML in the source is escaped, not passed through.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(kind: &str) -> serde_json::Value {
        json!({
            "site_name": "Hospital Website",
            "year": 2030,
            "menu": [{ "title": "Blog", "url": "/blog/" }],
            "page": {
                "title": "Welcome <friends>",
                "intro": "",
                "body": "<p>Hello</p>",
                "kind": kind,
                "url_path": "/",
                "department": null,
                "icon": null,
                "author": null,
                "tags": [],
                "address": "1 Main Street",
                "phone": null,
                "email": null,
                "published": null
            },
            "children": [],
            "doctors": [],
            "path": "/missing/"
        })
    }

    #[test]
    fn every_kind_has_a_template() {
        let templates = SiteTemplates::new().unwrap();
        for kind in [
            "home",
            "standard",
            "service_index",
            "service",
            "blog_index",
            "blog_post",
            "doctor_index",
            "contact",
        ] {
            let html = templates.render(&format!("{}.html", kind), &context(kind)).unwrap();
            assert!(html.contains("Hospital Website"), "{}", kind);
            assert!(html.contains(r#"<a href="/blog/">Blog</a>"#), "{}", kind);
        }
    }

    #[test]
    fn titles_are_escaped_but_bodies_are_not() {
        let templates = SiteTemplates::new().unwrap();
        let html = templates.render("standard.html", &context("standard")).unwrap();
        assert!(html.contains("Welcome &lt;friends&gt;"));
        assert!(html.contains("<p>Hello</p>"));
    }

    #[test]
    fn not_found_page_names_the_path() {
        let templates = SiteTemplates::new().unwrap();
        let html = templates.render("404.html", &context("standard")).unwrap();
        assert!(html.contains("Page not found"));
        assert!(html.contains("&#x2F;missing&#x2F;"));
    }

    #[test]
    fn markdown_renders_and_escapes_raw_html() {
        let html = markdown_to_html("# Care\n\nWe **help**.\n\n<script>alert(1)</script>\n");
        assert!(html.contains("<h1>Care</h1>"));
        assert!(html.contains("<strong>help</strong>"));
        assert!(!html.contains("<script>"));
    }
}
