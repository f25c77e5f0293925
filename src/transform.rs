//! Automatic post-render transform.
//!
//! Rewrites finished HTML documents so every image matched by the configured
//! [`Selector`] references its responsive derivatives.
//!
//! ## Phases
//!
//! ```text
//! parse ──► collect ──► rewrite (parallel) ──► apply ──► serialize
//!           ImageSite    ImageRewrite            DOM       once
//! ```
//!
//! 1. **Collect**: walk the DOM and copy what each matched `<img>` needs
//!    (`src`, `title`) into a plain [`ImageSite`]. DOM handles are `Rc` based
//!    and stay on this thread.
//! 2. **Rewrite**: for every site, in parallel, resolve the reference, ensure
//!    its derivatives and compute an [`ImageRewrite`]: the attribute values to
//!    set and whether to wrap it in a caption. Sites share nothing but the
//!    staging directory, whose existence-checked writes are idempotent.
//! 3. **Apply**: set the attributes and build `<figure>`s on the DOM, then
//!    serialize the document a single time.
//!
//! Images without a local `src` (empty, `data:`, remote URLs) are skipped.
//! A document with no matched images is returned byte-for-byte unchanged.

use crate::cache::CacheStats;
use crate::config::SiteConfig;
use crate::derive::DerivativeGenerator;
use crate::imaging::ImageBackend;
use crate::markup::{auto_sizes, src_value, srcset_value};
use crate::paths::{ImageReference, ReferenceError};
use crate::plan::plan;
use crate::selector::Selector;
use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, LocalName, Namespace, QualName, parse_document};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use rayon::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Attributes carried from a titled image onto the `<img>` inside its figure.
const FIGURE_IMG_ATTRS: [&str; 4] = ["alt", "src", "srcset", "sizes"];

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialized document is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A transformed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transformed {
    pub html: String,
    /// Number of images rewritten.
    pub images: usize,
    pub stats: CacheStats,
}

/// What phase 2 needs to know about one matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageSite {
    src: String,
    title: Option<String>,
}

/// Mutation to apply to one matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageRewrite {
    /// New `src`, when the fallback file name differs from the reference.
    src: Option<String>,
    /// `None` for vector images, which keep their attributes.
    srcset: Option<String>,
    sizes: Option<String>,
    /// Replace the element with a `<figure>` captioned by this text.
    caption: Option<String>,
    stats: CacheStats,
}

/// Rewrite every image in `html` matched by `selector`.
pub fn transform_html<B: ImageBackend>(
    config: &SiteConfig,
    selector: &Selector,
    generator: &DerivativeGenerator<B>,
    html: &str,
) -> Result<Transformed, TransformError> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())?;

    let elements = selector.select_all(&dom.document);
    if elements.is_empty() {
        return Ok(Transformed {
            html: html.to_string(),
            ..Transformed::default()
        });
    }

    let sites: Vec<Option<ImageSite>> = elements.iter().map(collect_site).collect();
    let rewrites: Vec<Option<ImageRewrite>> = sites
        .par_iter()
        .map(|site| site.as_ref().and_then(|s| compute_rewrite(config, generator, s)))
        .collect();

    let mut result = Transformed::default();
    for (element, rewrite) in elements.iter().zip(&rewrites) {
        let Some(rewrite) = rewrite else { continue };
        apply_rewrite(element, rewrite);
        result.images += 1;
        result.stats.merge(&rewrite.stats);
    }

    let mut bytes = Vec::new();
    serialize(
        &mut bytes,
        &SerializableHandle::from(dom.document.clone()),
        SerializeOpts::default(),
    )?;
    result.html = String::from_utf8(bytes)?;
    Ok(result)
}

// =============================================================================
// Phase 1: collect
// =============================================================================

fn collect_site(element: &Handle) -> Option<ImageSite> {
    let src = attribute(element, "src")?;
    if src.trim().is_empty() {
        return None;
    }
    Some(ImageSite {
        src,
        title: attribute(element, "title"),
    })
}

// =============================================================================
// Phase 2: rewrite
// =============================================================================

fn compute_rewrite<B: ImageBackend>(
    config: &SiteConfig,
    generator: &DerivativeGenerator<B>,
    site: &ImageSite,
) -> Option<ImageRewrite> {
    let image = match ImageReference::parse(&site.src) {
        Ok(image) => image,
        Err(e @ ReferenceError::Traversal(_)) => {
            tracing::warn!(src = %site.src, error = %e, "image skipped");
            return None;
        }
        Err(e) => {
            tracing::debug!(src = %site.src, error = %e, "image skipped");
            return None;
        }
    };

    let sizes = plan(config.fallback_width, config.fallback_height, &config.widths);
    let derived = generator.ensure_plan(&image, &sizes, config.crop_position);
    let raster = !image.is_vector();

    Some(ImageRewrite {
        src: (!image.fallback_keeps_name()).then(|| src_value(&image, &derived)),
        srcset: raster.then(|| srcset_value(&image, &derived)),
        sizes: raster.then(|| auto_sizes(config.fallback_width)),
        caption: site
            .title
            .as_ref()
            .filter(|t| config.create_captions && !t.trim().is_empty())
            .cloned(),
        stats: derived.outcomes().collect(),
    })
}

// =============================================================================
// Phase 3: apply
// =============================================================================

fn apply_rewrite(element: &Handle, rewrite: &ImageRewrite) {
    if let Some(src) = &rewrite.src {
        set_attribute(element, "src", src);
    }
    if let Some(srcset) = &rewrite.srcset {
        set_attribute(element, "srcset", srcset);
    }
    if let Some(sizes) = &rewrite.sizes {
        set_attribute(element, "sizes", sizes);
    }
    if let Some(caption) = &rewrite.caption {
        replace_with_figure(element, caption);
    }
}

/// Replace `element` in its parent by
/// `<figure><img …><figcaption>{caption}</figcaption></figure>`.
fn replace_with_figure(element: &Handle, caption: &str) {
    let NodeData::Element { name, .. } = &element.data else {
        return;
    };
    let Some(weak_parent) = element.parent.take() else {
        return;
    };
    let Some(parent) = weak_parent.upgrade() else {
        return;
    };

    let attrs = FIGURE_IMG_ATTRS
        .iter()
        .filter_map(|&key| attribute(element, key).map(|value| new_attribute(key, &value)))
        .collect();
    let img = new_element(&name.ns, "img", attrs);
    let figcaption = new_element(&name.ns, "figcaption", Vec::new());
    append(
        &figcaption,
        Node::new(NodeData::Text {
            contents: RefCell::new(StrTendril::from(caption)),
        }),
    );
    let figure = new_element(&name.ns, "figure", Vec::new());
    append(&figure, img);
    append(&figure, figcaption);

    let mut siblings = parent.children.borrow_mut();
    match siblings.iter().position(|c| Rc::ptr_eq(c, element)) {
        Some(pos) => {
            figure.parent.set(Some(weak_parent));
            siblings[pos] = figure;
        }
        None => element.parent.set(Some(weak_parent)),
    }
}

// =============================================================================
// DOM helpers
// =============================================================================

fn attribute(element: &Handle, key: &str) -> Option<String> {
    let NodeData::Element { attrs, .. } = &element.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|a| &*a.name.local == key)
        .map(|a| a.value.to_string())
}

fn set_attribute(element: &Handle, key: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &element.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    match attrs.iter_mut().find(|a| &*a.name.local == key) {
        Some(existing) => existing.value = StrTendril::from(value),
        None => attrs.push(new_attribute(key, value)),
    }
}

fn new_attribute(key: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(key)),
        value: StrTendril::from(value),
    }
}

fn new_element(ns: &Namespace, local: &str, attrs: Vec<Attribute>) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, ns.clone(), LocalName::from(local)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}
