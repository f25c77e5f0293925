//! # Simple Srcset
//!
//! Responsive images for static site builds. Given a source image and a set of
//! breakpoint widths, the pipeline produces (or reuses) resized derivatives,
//! names them so repeated builds are idempotent, and emits `srcset`/`sizes`
//! markup pointing at them.
//!
//! # Architecture
//!
//! Two independent call paths share one planning and generation core:
//!
//! ```text
//! template helper ──┐                                   ┌──► <img srcset=…>
//!                   ├──► plan ──► derive ──► staging/ ──┤
//! rendered page  ───┘   (sizes)  (resize     (cache)    └──► rewritten page
//!                                 or reuse)
//!
//! end of build:  staging/ ──► finalize ──► output_dir/
//! ```
//!
//! - The **explicit helper** ([`markup::srcset`]) is called from template code
//!   with an image reference and optional width, height, crop, sizes, class and
//!   alt, and returns a complete `<img>` tag.
//! - The **automatic transform** ([`transform`]) runs over finished HTML,
//!   selects images with a CSS-like selector, and rewrites their `srcset` and
//!   `sizes` in place, optionally turning `title` into a `<figcaption>`.
//!
//! Both resolve references through [`paths`], plan sizes with [`plan`], and
//! ensure files through [`derive`], so they always agree on file names.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`paths`] | Image references, stem/extension rules, source and staging paths |
//! | [`cache`] | Derivative keys, naming policies, cache statistics |
//! | [`derive`] | Ensures one derivative exists; vector pass-through; per-image failure isolation |
//! | [`plan`] | Base size plus breakpoints, aspect-preserving heights |
//! | [`markup`] | `srcset`/`sizes` values and the explicit `<img>` helper (Maud) |
//! | [`selector`] | Selector subset used by the automatic transform |
//! | [`transform`] | Parse, rewrite in parallel, serialize (html5ever) |
//! | [`finalize`] | Copies the staging tree into the output directory |
//! | [`pipeline`] | Wires an immutable config into all of the above |
//! | [`config`] | `srcset.toml` loading, validation, merging |
//! | [`imaging`] | Resize capability: `ImageBackend` trait and the pure-Rust backend |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Filesystem Is the Cache
//!
//! A derivative's file name is a pure function of its key (source, box, crop,
//! source mtime). If a file with that name exists in the staging directory, it
//! is used as-is. There is no manifest to keep in sync, the check is durable
//! across builds, and concurrent requests for the same key at worst write the
//! same bytes twice. See [`cache`] for the two naming policies and why hashed
//! names are the default.
//!
//! ## Staging, Then Promote
//!
//! Derivatives are written to a staging directory while pages render and are
//! copied to the output directory once at the end. The staging directory
//! survives between builds, so a clean output directory still gets a warm
//! cache.
//!
//! ## Failures Stay Local
//!
//! A missing or corrupt source image is logged and reported as a failed
//! derivative; its markup is still emitted. Nothing below the page level can
//! fail a build.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module decodes and encodes with the `image` crate and
//! implements cover crops (anchored, entropy and attention) on top of it. No
//! system libraries are required.

pub mod cache;
pub mod config;
pub mod derive;
pub mod finalize;
pub mod imaging;
pub mod markup;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod plan;
pub mod selector;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
