//! HTML extractor for marketplace search-result grids.
//!
//! Each result card is an overlay anchor pointing at the item page, followed by
//! a summary block with brand, price and a `size · condition` subtitle. Cards
//! whose link carries no item id are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Extractor, Listing, ListingId};

static ITEM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/items/([\d.]+)-").expect("invalid item id regex"));

static OVERLAY_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[class*='new-item-box__overlay']").expect("invalid overlay selector")
});
static BRAND: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p[data-testid$='--description-title']").expect("invalid brand selector")
});
static PRICE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p[data-testid$='--price-text']").expect("invalid price selector")
});
static SUBTITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p[data-testid$='--description-subtitle']")
        .expect("invalid subtitle selector")
});
static IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("invalid image selector"));

const SUMMARY_CLASS: &str = "new-item-box__summary";

/// Extracts listings from a rendered search page.
#[derive(Debug, Clone)]
pub struct HtmlListingExtractor {
    base_url: Url,
}

impl HtmlListingExtractor {
    /// `base_url` resolves relative item links, normally the search URL itself.
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    fn parse_card(&self, link: ElementRef<'_>) -> Option<Listing> {
        let href = link.value().attr("href").unwrap_or_default();
        let id = ITEM_ID_RE.captures(href)?.get(1)?.as_str();

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            self.base_url.join(href).ok()?.to_string()
        };

        let mut listing = Listing::new(ListingId::new(id), url);
        if let Some(title) = link.value().attr("title") {
            listing = listing.with_title(title);
        }

        let container = link.parent().and_then(ElementRef::wrap);

        if let Some(summary) = container.and_then(summary_block) {
            if let Some(brand) = first_text(summary, &BRAND) {
                listing = listing.with_brand(brand);
            }
            if let Some(price) = first_text(summary, &PRICE) {
                listing = listing.with_price(price);
            }
            if let Some(subtitle) = first_text(summary, &SUBTITLE) {
                let mut parts = subtitle.split('·').map(str::trim);
                if let Some(size) = parts.next() {
                    listing = listing.with_size(size);
                }
                if let Some(status) = parts.next() {
                    listing = listing.with_status(status);
                }
            }
        }

        if let Some(src) = container.and_then(image_source) {
            listing = listing.with_image_url(absolute_image_url(&src));
        }

        Some(listing)
    }
}

impl Extractor for HtmlListingExtractor {
    fn extract(&self, body: &str) -> Vec<Listing> {
        let document = Html::parse_document(body);
        document
            .select(&OVERLAY_LINK)
            .filter_map(|link| self.parse_card(link))
            .collect()
    }
}

fn summary_block(container: ElementRef<'_>) -> Option<ElementRef<'_>> {
    container
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == "div"
                && el.value().classes().any(|class| class == SUMMARY_CLASS)
        })
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = scope.select(selector).next()?.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn image_source(container: ElementRef<'_>) -> Option<String> {
    let img = container.select(&IMAGE).next()?;
    img.value()
        .attr("data-src")
        .filter(|src| !src.is_empty())
        .or_else(|| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

fn absolute_image_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}
