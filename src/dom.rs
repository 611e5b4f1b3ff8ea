use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("invalid selector '{0}'")]
    Selector(String),
    #[error("no element matching '{0}' in the current document")]
    MissingRegion(String),
    #[error("fetched document contains no element matching '{0}'")]
    MissingFragment(String),
}

/// Live document for one page view. All mutation goes through node handles
/// obtained from the selector helpers; the document itself is only replaced
/// wholesale per region.
pub struct PageDocument {
    root: NodeRef,
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchiki::parse_html().one(html),
        }
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn select_first(&self, selector: &str) -> Option<NodeRef> {
        select_first(&self.root, selector)
    }

    pub fn select_all(&self, selector: &str) -> Vec<NodeRef> {
        select_all(&self.root, selector)
    }

    /// Serialize the whole document back to HTML.
    pub fn html(&self) -> String {
        let mut buf = Vec::new();
        if self.root.serialize(&mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Replace the subtree matching `selector` with the corresponding subtree
    /// of a freshly fetched document. The fetched document is discarded after
    /// the replacement subtree has been extracted. Afterwards exactly one
    /// matching subtree exists: surplus matches in the live page are detached.
    /// Any error leaves the current subtree in place.
    pub fn replace_region(&self, selector: &str, fragment_html: &str) -> Result<(), PatchError> {
        let matches: Vec<NodeRef> = self
            .root
            .select(selector)
            .map_err(|()| PatchError::Selector(selector.to_string()))?
            .map(|found| found.as_node().clone())
            .collect();
        let current = matches
            .first()
            .ok_or_else(|| PatchError::MissingRegion(selector.to_string()))?;

        let fetched = kuchiki::parse_html().one(fragment_html);
        let replacement = select_first(&fetched, selector)
            .ok_or_else(|| PatchError::MissingFragment(selector.to_string()))?;

        replacement.detach();
        current.insert_after(replacement);
        current.detach();
        for stale in matches.iter().skip(1) {
            stale.detach();
        }
        Ok(())
    }
}

pub fn select_first(scope: &NodeRef, selector: &str) -> Option<NodeRef> {
    scope
        .select_first(selector)
        .ok()
        .map(|found| found.as_node().clone())
}

pub fn select_all(scope: &NodeRef, selector: &str) -> Vec<NodeRef> {
    match scope.select(selector) {
        Ok(found) => found.map(|node| node.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    }
}

pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attributes = element.attributes.borrow();
    attributes.get(name).map(|value| value.to_string())
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().insert(name, value.to_string());
    }
}

/// Parse an HTML snippet and return its top-level nodes, detached and ready
/// to be appended elsewhere.
pub fn parse_snippet(html: &str) -> Vec<NodeRef> {
    let document = kuchiki::parse_html().one(html);
    let Some(body) = select_first(&document, "body") else {
        return Vec::new();
    };
    let children: Vec<NodeRef> = body.children().collect();
    for child in &children {
        child.detach();
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div class="challenge-page"><p>waiting</p></div>
        </body></html>
    "#;

    #[test]
    fn replace_region_swaps_subtree() {
        let document = PageDocument::parse(PAGE);
        let fetched = r#"<html><body><div class="challenge-page"><p>accepted</p></div></body></html>"#;

        document
            .replace_region(".challenge-page", fetched)
            .expect("patch");

        let html = document.html();
        assert!(html.contains("accepted"));
        assert!(!html.contains("waiting"));
        assert_eq!(document.select_all(".challenge-page").len(), 1);
    }

    #[test]
    fn replace_region_leaves_single_subtree_when_page_had_duplicates() {
        let page = r#"
            <html><body>
                <div class="challenge-page">one</div>
                <div class="challenge-page">two</div>
            </body></html>
        "#;
        let document = PageDocument::parse(page);
        let fetched = r#"<div class="challenge-page">fresh</div>"#;

        document
            .replace_region(".challenge-page", fetched)
            .expect("patch");

        let regions = document.select_all(".challenge-page");
        assert_eq!(regions.len(), 1);
        assert!(document.html().contains("fresh"));
    }

    #[test]
    fn replace_region_errors_keep_old_subtree() {
        let document = PageDocument::parse(PAGE);

        let missing_fragment = document.replace_region(".challenge-page", "<div>no region</div>");
        assert!(matches!(missing_fragment, Err(PatchError::MissingFragment(_))));
        assert!(document.html().contains("waiting"));

        let missing_region = document.replace_region(".absent", "<div class=\"absent\"></div>");
        assert!(matches!(missing_region, Err(PatchError::MissingRegion(_))));
    }

    #[test]
    fn parse_snippet_returns_detached_nodes() {
        let nodes = parse_snippet(r#"<span class="ddloader"></span>"#);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].parent().is_none());
    }
}
