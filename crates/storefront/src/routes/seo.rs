//! `robots.txt` and `sitemap.xml`.
//!
//! Both are rendered from templates and kept in the state's SEO cache for an
//! hour, so catalog edits show up on the next refresh.

use askama::Template;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::db::categories;
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::{Category, Product};
use crate::state::AppState;

const ROBOTS_KEY: &str = "robots.txt";
const SITEMAP_KEY: &str = "sitemap.xml";
const CACHE_CONTROL: &str = "public, max-age=3600";

/// Pages listed in the sitemap besides the catalog.
const STATIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "daily", "1.0"),
    ("/products", "daily", "0.9"),
    ("/cart", "monthly", "0.3"),
];

#[derive(Template)]
#[template(path = "seo/robots.txt")]
struct RobotsTemplate<'a> {
    base_url: &'a str,
}

struct SitemapEntry {
    loc: String,
    lastmod: Option<String>,
    changefreq: &'static str,
    priority: &'static str,
}

#[derive(Template)]
#[template(path = "seo/sitemap.xml")]
struct SitemapTemplate {
    entries: Vec<SitemapEntry>,
}

fn w3c_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn sitemap_entries(base_url: &str, categories: &[Category], products: &[Product]) -> Vec<SitemapEntry> {
    let base = base_url.trim_end_matches('/');

    let pages = STATIC_PAGES.iter().map(|&(path, changefreq, priority)| SitemapEntry {
        loc: format!("{base}{path}"),
        lastmod: None,
        changefreq,
        priority,
    });
    let categories = categories.iter().map(|c| SitemapEntry {
        loc: format!("{base}/categories/{}", c.slug),
        lastmod: Some(w3c_date(c.updated_at)),
        changefreq: "weekly",
        priority: "0.7",
    });
    let products = products.iter().map(|p| SitemapEntry {
        loc: format!("{base}/products/{}", p.slug),
        lastmod: Some(w3c_date(p.updated_at)),
        changefreq: "weekly",
        priority: "0.8",
    });

    pages.chain(categories).chain(products).collect()
}

fn render_robots(base_url: &str) -> Result<String> {
    RobotsTemplate {
        base_url: base_url.trim_end_matches('/'),
    }
    .render()
    .map_err(|e| AppError::Internal(format!("robots.txt: {e}")))
}

fn render_sitemap(base_url: &str, categories: &[Category], products: &[Product]) -> Result<String> {
    SitemapTemplate {
        entries: sitemap_entries(base_url, categories, products),
    }
    .render()
    .map_err(|e| AppError::Internal(format!("sitemap.xml: {e}")))
}

/// `GET /robots.txt`
pub async fn robots(State(state): State<AppState>) -> Result<Response> {
    let body = state
        .seo_cache()
        .try_get_with(ROBOTS_KEY, async { render_robots(&state.config().base_url) })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        body,
    )
        .into_response())
}

/// `GET /sitemap.xml`
pub async fn sitemap(State(state): State<AppState>) -> Result<Response> {
    let body = state
        .seo_cache()
        .try_get_with(SITEMAP_KEY, async {
            let categories = categories::list_active(state.pool()).await?;
            let products = ProductRepository::new(state.pool()).list_active(None).await?;
            tracing::debug!(
                categories = categories.len(),
                products = products.len(),
                "sitemap regenerated"
            );
            render_sitemap(&state.config().base_url, &categories, &products)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ayurmart_core::{CategoryId, ProductId};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn category() -> Category {
        Category {
            id: CategoryId::generate(),
            name: "Churnas".to_string(),
            slug: "churnas".to_string(),
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        }
    }

    fn product() -> Product {
        Product {
            id: ProductId::generate(),
            category_id: None,
            name: "Triphala Churna".to_string(),
            slug: "triphala-churna".to_string(),
            description: String::new(),
            price: Decimal::from(180),
            image_url: None,
            stock_quantity: 40,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_robots_points_at_sitemap() {
        let body = render_robots("https://ayurmart.in/").unwrap();
        assert!(body.contains("Disallow: /api/"));
        assert!(body.contains("Disallow: /checkout"));
        assert!(body.contains("Sitemap: https://ayurmart.in/sitemap.xml"));
    }

    #[test]
    fn test_sitemap_lists_catalog() {
        let body = render_sitemap("https://ayurmart.in", &[category()], &[product()]).unwrap();
        assert!(body.starts_with("<?xml"));
        assert!(body.contains("<loc>https://ayurmart.in/</loc>"));
        assert!(body.contains("<loc>https://ayurmart.in/categories/churnas</loc>"));
        assert!(body.contains("<loc>https://ayurmart.in/products/triphala-churna</loc>"));
        assert!(body.contains("<lastmod>2026-03-14</lastmod>"));
        assert!(body.contains("<lastmod>2026-02-01</lastmod>"));
    }

    #[test]
    fn test_sitemap_without_catalog() {
        let entries = sitemap_entries("https://ayurmart.in", &[], &[]);
        assert_eq!(entries.len(), STATIC_PAGES.len());
        assert!(entries.iter().all(|e| e.lastmod.is_none()));
    }
}
