//! CSS selector subset for choosing which images the transform rewrites.
//!
//! Supported syntax:
//!
//! | Form | Matches |
//! |------|---------|
//! | `img` | elements by tag name (case-insensitive) |
//! | `.page-body` | elements carrying the class |
//! | `#hero` | the element with that id |
//! | `*` | any element |
//! | `a b` | `b` with an ancestor matching `a` |
//! | `a > b` | `b` whose parent matches `a` |
//! | `a, b` | either |
//!
//! Simple selectors combine into compounds (`img.wide#hero`). Attribute
//! selectors, pseudo-classes and sibling combinators are rejected at parse
//! time, so a typo in the configuration fails validation instead of silently
//! matching nothing.

use markup5ever_rcdom::{Handle, NodeData};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

/// Compounds joined by combinators, leftmost first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// Lowercase tag name; `None` for `*` or when omitted.
    tag: Option<String>,
    classes: Vec<String>,
    id: Option<String>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let fail = |reason: &str| SelectorError {
            selector: input.to_string(),
            reason: reason.to_string(),
        };

        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let complex = parse_complex(part).map_err(|reason| fail(&reason))?;
            alternatives.push(complex);
        }
        Ok(Self { alternatives })
    }

    /// True when `element` matches any alternative.
    pub fn matches(&self, element: &Handle) -> bool {
        self.alternatives.iter().any(|c| c.matches(element))
    }

    /// Every matching element under `root`, in document order.
    pub fn select_all(&self, root: &Handle) -> Vec<Handle> {
        let mut found = Vec::new();
        self.collect(root, &mut found);
        found
    }

    fn collect(&self, node: &Handle, found: &mut Vec<Handle>) {
        if matches!(node.data, NodeData::Element { .. }) && self.matches(node) {
            found.push(node.clone());
        }
        for child in node.children.borrow().iter() {
            self.collect(child, found);
        }
        // <template> contents live outside the main tree
        if let NodeData::Element {
            template_contents, ..
        } = &node.data
            && let Some(contents) = template_contents.borrow().as_ref()
        {
            self.collect(contents, found);
        }
    }
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;
    let mut chars = input.trim().chars().peekable();

    if chars.peek().is_none() {
        return Err("empty selector".into());
    }

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            if pending.is_none() && !compounds.is_empty() {
                pending = Some(Combinator::Descendant);
            }
            continue;
        }
        if c == '>' {
            chars.next();
            if compounds.is_empty() || pending == Some(Combinator::Child) {
                return Err("'>' without a left-hand side".into());
            }
            pending = Some(Combinator::Child);
            continue;
        }

        let compound = parse_compound(&mut chars)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        compounds.push(compound);
    }

    if pending == Some(Combinator::Child) {
        return Err("'>' without a right-hand side".into());
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn parse_compound(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut any = false;

    if chars.peek() == Some(&'*') {
        chars.next();
        any = true;
    } else if chars.peek().is_some_and(|c| is_ident_char(*c)) {
        compound.tag = Some(read_ident(chars).to_ascii_lowercase());
        any = true;
    }

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                let class = read_ident(chars);
                if class.is_empty() {
                    return Err("'.' must be followed by a class name".into());
                }
                compound.classes.push(class);
            }
            '#' => {
                chars.next();
                let id = read_ident(chars);
                if id.is_empty() {
                    return Err("'#' must be followed by an id".into());
                }
                compound.id = Some(id);
            }
            c if c.is_whitespace() || c == '>' => break,
            c => return Err(format!("unsupported character {c:?}")),
        }
        any = true;
    }

    if !any {
        return Err("expected a selector".into());
    }
    Ok(compound)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    ident
}

impl Complex {
    fn matches(&self, element: &Handle) -> bool {
        self.matches_at(self.compounds.len() - 1, element)
    }

    /// Match `compounds[..=idx]` with `compounds[idx]` anchored at `element`.
    fn matches_at(&self, idx: usize, element: &Handle) -> bool {
        if !self.compounds[idx].matches(element) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => {
                parent_element(element).is_some_and(|parent| self.matches_at(idx - 1, &parent))
            }
            Combinator::Descendant => {
                let mut ancestor = parent_element(element);
                while let Some(node) = ancestor {
                    if self.matches_at(idx - 1, &node) {
                        return true;
                    }
                    ancestor = parent_element(&node);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches(&self, element: &Handle) -> bool {
        let NodeData::Element { name, attrs, .. } = &element.data else {
            return false;
        };
        if let Some(tag) = &self.tag
            && !(*name.local).eq_ignore_ascii_case(tag.as_str())
        {
            return false;
        }
        if self.id.is_none() && self.classes.is_empty() {
            return true;
        }

        let attrs = attrs.borrow();
        let value = |key: &str| {
            attrs
                .iter()
                .find(|a| &*a.name.local == key)
                .map(|a| a.value.to_string())
        };
        if let Some(id) = &self.id
            && value("id").as_deref() != Some(id.as_str())
        {
            return false;
        }
        let classes = value("class").unwrap_or_default();
        self.classes
            .iter()
            .all(|wanted| classes.split_whitespace().any(|c| c == wanted))
    }
}

/// Parent of `node` if it is an element.
fn parent_element(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take()?;
    let parent = weak.upgrade();
    node.parent.set(Some(weak));
    parent.filter(|p| matches!(p.data, NodeData::Element { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use html5ever::parse_document;
    use html5ever::tendril::TendrilSink;
    use markup5ever_rcdom::RcDom;

    fn dom(html: &str) -> RcDom {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .unwrap()
    }

    fn srcs(selector: &str, html: &str) -> Vec<String> {
        let dom = dom(html);
        Selector::parse(selector)
            .unwrap()
            .select_all(&dom.document)
            .iter()
            .filter_map(|node| match &node.data {
                NodeData::Element { attrs, .. } => attrs
                    .borrow()
                    .iter()
                    .find(|a| &*a.name.local == "src")
                    .map(|a| a.value.to_string()),
                _ => None,
            })
            .collect()
    }

    const PAGE: &str = r#"<html><body>
        <img src="logo.png">
        <main class="page-body wide">
          <p><img src="a.jpg" class="hero"></p>
          <img src="b.jpg" id="main">
        </main>
        <aside class="page-body"><img src="c.jpg"></aside>
    </body></html>"#;

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parse_accepts_supported_forms() {
        for s in [
            "img",
            "*",
            ".page-body img",
            "main > img",
            "img.hero#main",
            "article img, .gallery > img",
            "  img  ",
        ] {
            assert!(Selector::parse(s).is_ok(), "{s}");
        }
    }

    #[test]
    fn parse_rejects_unsupported_forms() {
        for s in ["img[src", "img[alt]", "a:hover", "a + b", "a ~ b", "> img", "img >", "", "img,", ". img"] {
            assert!(Selector::parse(s).is_err(), "{s}");
        }
    }

    #[test]
    fn parse_error_names_the_selector() {
        let err = Selector::parse("img[src").unwrap_err();
        assert_eq!(err.selector, "img[src");
        assert!(err.to_string().contains("'['"));
    }

    // =========================================================================
    // Matching
    // =========================================================================

    #[test]
    fn type_selector_matches_every_image() {
        assert_eq!(srcs("img", PAGE), vec!["logo.png", "a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn type_selector_ignores_case() {
        assert_eq!(srcs("IMG", PAGE).len(), 4);
    }

    #[test]
    fn descendant_combinator() {
        assert_eq!(srcs(".page-body img", PAGE), vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn child_combinator() {
        assert_eq!(srcs("main > img", PAGE), vec!["b.jpg"]);
        assert_eq!(srcs("main > p > img", PAGE), vec!["a.jpg"]);
    }

    #[test]
    fn compound_class_and_id() {
        assert_eq!(srcs(".page-body.wide img", PAGE), vec!["a.jpg", "b.jpg"]);
        assert_eq!(srcs("img#main", PAGE), vec!["b.jpg"]);
        assert_eq!(srcs("img.hero", PAGE), vec!["a.jpg"]);
    }

    #[test]
    fn selector_list_keeps_document_order() {
        assert_eq!(srcs("aside img, #main", PAGE), vec!["b.jpg", "c.jpg"]);
    }

    #[test]
    fn descendant_backtracks_past_first_ancestor_match() {
        let html = r#"<div class="x"><section><div><img src="deep.jpg"></div></section></div>"#;
        assert_eq!(srcs(".x section img", html), vec!["deep.jpg"]);
        assert_eq!(srcs("section > img", html), Vec::<String>::new());
    }

    #[test]
    fn universal_matches_everything_under_parent() {
        assert_eq!(srcs("aside > *", PAGE), vec!["c.jpg"]);
    }
}
