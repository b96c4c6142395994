//! Graph extraction over realistic multi-page transcripts.

use qapilot::scanner::scan_outputs;

/// Three pages, each with a metadata block, connected by two clicks.
const THREE_PAGE_RUN: &str = "\
✅ navigated to https://example.com/: page title 'Example Domain'

✅ page metadata extracted: https://example.com/
📄 Page Metadata:
  • URL: https://example.com/
  • Title: Example Domain

🎯 Element Metadata (Found 2 element(s)):
  Element 1:
  • Selector: a.link-main
  • Tag: <a>
  • Type: link
  • Text: More information...
  • Href: https://www.iana.org/domains/example
  • ID: None
  • Name: None
  • Class: link-main

  Element 2:
  • Selector: p#example-text
  • Tag: <p>
  • Type: p
  • Text: This domain is for use in illustrative examples
  • Href: None
  • ID: example-text
  • Name: None
  • Class: description

✅ clicked element a.link-main: More information

✅ navigated to https://www.iana.org/domains/example: page title 'IANA-managed Reserved Domains'

✅ page metadata extracted: https://www.iana.org/domains/example
📄 Page Metadata:
  • URL: https://www.iana.org/domains/example
  • Title: IANA-managed Reserved Domains

🎯 Element Metadata (Found 3 element(s)):
  Element 1:
  • Selector: a#about-link
  • Tag: <a>
  • Type: link
  • Text: About
  • Href: https://www.iana.org/about
  • ID: about-link
  • Name: None
  • Class: nav-link

  Element 2:
  • Selector: button#submit-btn
  • Tag: <button>
  • Type: button
  • Text: Submit
  • Href: None
  • ID: submit-btn
  • Name: submit
  • Class: btn-primary

  Element 3:
  • Selector: input#search-input
  • Tag: <input>
  • Type: input
  • Text: None
  • Href: None
  • ID: search-input
  • Name: search
  • Class: form-control
  • Input Type: text

✅ clicked element a#about-link: About

✅ navigated to https://www.iana.org/about: page title 'About Us'

✅ page metadata extracted: https://www.iana.org/about
📄 Page Metadata:
  • URL: https://www.iana.org/about
  • Title: About Us

🎯 Element Metadata (Found 1 element(s)):
  Element 1:
  • Selector: a#contact-link
  • Tag: <a>
  • Type: link
  • Text: Contact Us
  • Href: https://www.iana.org/contact
  • ID: contact-link
  • Name: None
  • Class: footer-link

✅ screenshot captured: about.png

✅ browser closed: session released
";

#[test]
fn three_page_run_extracts_pages_elements_and_edges() {
    let result = scan_outputs(std::iter::once(THREE_PAGE_RUN));

    assert_eq!(result.pages.len(), 3);
    let ids: Vec<&str> = result.pages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["page_1", "page_2", "page_3"]);

    assert_eq!(result.pages[0].label, "Example Domain (example.com)");
    assert_eq!(result.pages[0].key_elements.len(), 2);
    assert_eq!(result.pages[1].key_elements.len(), 3);
    assert_eq!(result.pages[2].key_elements.len(), 1);

    // Positional layout.
    assert_eq!(
        result.pages.iter().map(|p| p.x).collect::<Vec<_>>(),
        vec![200, 500, 800]
    );
    assert!(result.pages.iter().all(|p| p.y == 100));

    assert_eq!(result.edges.len(), 2);
    assert_eq!(result.edges[0].source, "page_1");
    assert_eq!(result.edges[0].target, "page_2");
    assert!(result.edges[0].label.contains("More information"));
    assert_eq!(result.edges[1].source, "page_2");
    assert_eq!(result.edges[1].target, "page_3");
    assert_eq!(result.edges[1].label, "Click About");
}

#[test]
fn element_attributes_survive_extraction() {
    let result = scan_outputs(std::iter::once(THREE_PAGE_RUN));

    let iana = &result.pages[1];
    let button = &iana.key_elements[1];
    assert_eq!(button.kind, "button");
    assert_eq!(button.tag, "button");
    assert_eq!(button.element_id.as_deref(), Some("submit-btn"));
    assert_eq!(button.name.as_deref(), Some("submit"));
    assert_eq!(button.class_name.as_deref(), Some("btn-primary"));
    assert!(button.href.is_none());

    let input = &iana.key_elements[2];
    assert_eq!(input.kind, "input");
    assert_eq!(input.input_type.as_deref(), Some("text"));
    assert!(input.text.is_none());

    // depends_on stays reserved and empty.
    assert!(result
        .pages
        .iter()
        .flat_map(|p| &p.key_elements)
        .all(|e| e.depends_on.is_empty()));
}

#[test]
fn scanning_is_deterministic_across_repeated_runs() {
    let first = scan_outputs(std::iter::once(THREE_PAGE_RUN));
    for _ in 0..5 {
        let again = scan_outputs(std::iter::once(THREE_PAGE_RUN));
        assert_eq!(first, again);
    }
}

#[test]
fn split_across_tool_turns_matches_single_block() {
    // The same run delivered as one text or as per-outcome turns must
    // yield the same graph. Every outcome starts with a status marker.
    let mut turns: Vec<String> = Vec::new();
    for line in THREE_PAGE_RUN.lines() {
        if line.starts_with('✅') || line.starts_with('❌') {
            turns.push(line.to_string());
        } else if let Some(last) = turns.last_mut() {
            last.push('\n');
            last.push_str(line);
        }
    }
    let split_result = scan_outputs(turns.iter().map(String::as_str));
    let whole_result = scan_outputs(std::iter::once(THREE_PAGE_RUN));

    assert_eq!(split_result.pages.len(), whole_result.pages.len());
    assert_eq!(split_result.edges.len(), whole_result.edges.len());
    for (a, b) in split_result.pages.iter().zip(whole_result.pages.iter()) {
        assert_eq!(a.url, b.url);
        assert_eq!(a.key_elements.len(), b.key_elements.len());
    }
}

#[test]
fn unrelated_outcome_lines_do_not_create_entities() {
    let output = "\
✅ element appeared: #login-form

✅ text appeared: 'Welcome back'

✅ script executed: 42

❌ wait_for_selector failed: element .spinner did not appear within 2000ms";
    let result = scan_outputs(std::iter::once(output));
    assert!(result.pages.is_empty());
    assert!(result.edges.is_empty());
}
