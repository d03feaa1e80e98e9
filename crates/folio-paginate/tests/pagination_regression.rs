use folio::{parse_fragment, Document, NodeId};
use folio_paginate::{
    paginate, paginate_markup, LineEstimateConfig, LineEstimateMeasurer, MeasureError, MeasureFn,
    Page, PaginateDiagnostic, PaginateOptions, SessionState, FOLLOW_UP_CLASS,
};

const MIXED: &str = "<h1>Title here</h1>\
<p>Alpha beta <em>gamma delta</em> epsilon.</p>\
<ul><li>one two three</li><li>four <strong>five six</strong></li></ul>\
<p>Zeta &amp; eta theta iota kappa lambda mu.</p>\
<ol start=\"4\"><li>nu xi</li><li>omicron pi rho sigma</li></ol>";

fn char_count(doc: &Document, page: NodeId) -> Result<f32, MeasureError> {
    Ok(doc.text_content(page).chars().count() as f32)
}

fn paginate_chars(markup: &str, budget: f32) -> Vec<Page> {
    let mut measurer = MeasureFn(char_count);
    let opts = PaginateOptions::default().with_page_height(budget);
    paginate_markup(markup, &mut measurer, opts)
        .unwrap_or_else(|e| panic!("paginate: {}", e))
        .map(|page| page.unwrap_or_else(|e| panic!("page: {}", e)))
        .collect()
}

fn text_of(markup: &str) -> String {
    let mut doc = Document::new();
    let root = parse_fragment(&mut doc, markup).unwrap_or_else(|e| panic!("parse: {}", e));
    doc.text_content(root)
}

#[test]
fn pages_concatenate_back_to_source_text() {
    let expected = text_of(MIXED);
    for budget in [5.0, 6.0, 9.0, 12.0, 17.0, 25.0, 40.0, 400.0] {
        let pages = paginate_chars(MIXED, budget);
        assert!(!pages.is_empty(), "budget {budget}: no pages");
        let joined: String = pages.iter().map(|page| text_of(&page.markup)).collect();
        assert_eq!(joined, expected, "budget {budget}");
    }
}

#[test]
fn pages_stay_within_budget_unless_overflowed() {
    for budget in [6.0, 9.0, 12.0, 25.0] {
        for page in paginate_chars(MIXED, budget) {
            let height = text_of(&page.markup).chars().count() as f32;
            assert!(
                height <= budget || page.overflowed,
                "budget {budget}: page {} has height {height}: {}",
                page.number,
                page.markup
            );
        }
    }
}

#[test]
fn page_numbers_are_sequential() {
    let pages = paginate_chars(MIXED, 9.0);
    for (idx, page) in pages.iter().enumerate() {
        assert_eq!(page.number, idx + 1);
    }
}

#[test]
fn split_list_item_continues_with_follow_up_marker() {
    let pages = paginate_chars("<ul><li>aaa bbb ccc</li><li>d</li></ul>", 8.0);
    let markups: Vec<&str> = pages.iter().map(|page| page.markup.as_str()).collect();
    assert_eq!(
        markups,
        [
            "<ul><li>aaa bbb </li></ul>",
            "<ul><li class=\"follow-up\">ccc</li><li>d</li></ul>",
        ]
    );
}

#[test]
fn ordered_list_split_between_items_advances_start() {
    let pages = paginate_chars("<ol><li>aaa bbb</li><li>ccc ddd</li><li>eee</li></ol>", 8.0);
    let markups: Vec<&str> = pages.iter().map(|page| page.markup.as_str()).collect();
    assert_eq!(
        markups,
        [
            "<ol><li>aaa bbb</li></ol>",
            "<ol start=\"2\"><li>ccc ddd</li></ol>",
            "<ol start=\"3\"><li>eee</li></ol>",
        ]
    );
}

/// Visible numbering stays continuous: each page's `start` equals one plus
/// the number of items begun on earlier pages, minus one when the page opens
/// with the continuation of an item.
#[test]
fn ordered_list_numbering_is_continuous_across_pages() {
    let items = [
        "first item",
        "second item is a little longer",
        "third",
        "fourth item spans several words here",
        "fifth",
        "sixth item",
        "seventh item with more words",
    ];
    let markup = format!(
        "<ol>{}</ol>",
        items
            .iter()
            .map(|item| format!("<li>{item}</li>"))
            .collect::<String>()
    );

    for budget in [10.0, 14.0, 20.0, 33.0] {
        let pages = paginate_chars(&markup, budget);
        assert!(pages.len() > 1, "budget {budget}: expected several pages");
        let mut started = 0i64;
        for page in &pages {
            let mut doc = Document::new();
            let root = parse_fragment(&mut doc, &page.markup)
                .unwrap_or_else(|e| panic!("parse page: {}", e));
            let ol = doc
                .first_child(root)
                .unwrap_or_else(|| panic!("page {} has no list", page.number));
            assert_eq!(doc.tag(ol), Some("ol"));

            let start = doc
                .attr(ol, "start")
                .map(|raw| raw.parse::<i64>().unwrap_or_else(|e| panic!("start: {}", e)))
                .unwrap_or(1);
            let flags: Vec<bool> = doc
                .children(ol)
                .filter_map(|li| doc.element(li))
                .map(|li| li.has_class(FOLLOW_UP_CLASS))
                .collect();
            let opens_with_continuation = flags.first().copied().unwrap_or(false);

            assert_eq!(
                start,
                1 + started - i64::from(opens_with_continuation),
                "budget {budget}: page {}: {}",
                page.number,
                page.markup
            );
            started += flags.iter().filter(|follow_up| !**follow_up).count() as i64;
        }
        assert_eq!(started, items.len() as i64, "budget {budget}");
    }
}

#[test]
fn oversized_word_gets_its_own_page() {
    let pages = paginate_chars("<p>tiny incomprehensibilities end</p>", 8.0);
    let markups: Vec<&str> = pages.iter().map(|page| page.markup.as_str()).collect();
    assert_eq!(
        markups,
        [
            "<p>tiny </p>",
            "<p>incomprehensibilities </p>",
            "<p>end</p>",
        ]
    );
    assert!(!pages[0].overflowed);
    assert!(pages[1].overflowed);
}

#[test]
fn paginate_accepts_a_prepared_document() {
    let mut doc = Document::new();
    let source = doc.create_fragment();
    for word in ["one", "two", "three"] {
        let p = doc.create_element("p");
        let text = doc.create_text(word);
        doc.append(p, text);
        doc.append(source, p);
    }

    let mut measurer = MeasureFn(|doc: &Document, page: NodeId| {
        Ok::<f32, MeasureError>(doc.children(page).count() as f32)
    });
    let opts = PaginateOptions::default().with_page_height(2.0);
    let mut session = paginate(doc, source, &mut measurer, opts);
    let mut markups = Vec::new();
    session
        .drain_pages(|page| markups.push(page.markup))
        .unwrap_or_else(|e| panic!("drain: {}", e));
    assert_eq!(markups, ["<p>one</p><p>two</p>", "<p>three</p>"]);
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(session.into_remaining_markup(), "");
}

#[test]
fn diagnostics_report_each_page() {
    let mut events = Vec::new();
    {
        let mut measurer = MeasureFn(char_count);
        let opts = PaginateOptions::default().with_page_height(8.0);
        let mut session = paginate_markup("<p>tiny incomprehensibilities</p>", &mut measurer, opts)
            .unwrap_or_else(|e| panic!("paginate: {}", e));
        session.set_diagnostic_sink(|d| events.push(d));
        let count = session
            .drain_pages(|_| {})
            .unwrap_or_else(|e| panic!("drain: {}", e));
        assert_eq!(count, 2);
    }
    assert_eq!(
        events,
        [
            PaginateDiagnostic::PageEmitted {
                number: 1,
                height: 5.0
            },
            PaginateDiagnostic::Overflowed {
                number: 2,
                height: 21.0,
                budget: 8.0
            },
            PaginateDiagnostic::PageEmitted {
                number: 2,
                height: 21.0
            },
        ]
    );
}

#[test]
fn abort_from_another_thread_stops_at_page_boundary() {
    let mut measurer = MeasureFn(char_count);
    let opts = PaginateOptions::default().with_page_height(4.0);
    let mut session = paginate_markup("<p>aa bb cc dd ee ff</p>", &mut measurer, opts)
        .unwrap_or_else(|e| panic!("paginate: {}", e));
    assert!(session.next_page().is_some());

    let handle = session.abort_handle();
    std::thread::spawn(move || handle.abort())
        .join()
        .unwrap_or_else(|_| panic!("abort thread panicked"));

    assert!(session.next_page().is_none());
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(session.pages_emitted(), 1);
    assert_eq!(session.remaining_markup(), "<p>bb cc dd ee ff</p>");
}

#[test]
fn failed_measurement_keeps_unemitted_content_in_source() {
    let mut calls = 0usize;
    // Page 1 takes seven measurements; the ninth is the second paragraph of page 2.
    let mut measurer = MeasureFn(|doc: &Document, page: NodeId| {
        calls += 1;
        if calls == 9 {
            return Err(MeasureError::new("layout surface detached"));
        }
        char_count(doc, page)
    });
    let opts = PaginateOptions::default().with_page_height(4.0);
    let mut session = paginate_markup(
        "<p>aa</p><p>bb</p><p>cc</p><p>dd</p>",
        &mut measurer,
        opts,
    )
    .unwrap_or_else(|e| panic!("paginate: {}", e));

    let first = session
        .next_page()
        .unwrap_or_else(|| panic!("missing page 1"))
        .unwrap_or_else(|e| panic!("page 1: {}", e));
    assert_eq!(first.markup, "<p>aa</p><p>bb</p>");

    let err = session
        .next_page()
        .unwrap_or_else(|| panic!("missing page 2 result"))
        .err()
        .unwrap_or_else(|| panic!("expected measurement failure"));
    assert!(matches!(err, folio_paginate::PaginateError::Measure(_)));
    assert!(session.next_page().is_none());
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(session.into_remaining_markup(), "<p>cc</p><p>dd</p>");
}

#[test]
fn malformed_markup_is_rejected() {
    let mut measurer = MeasureFn(char_count);
    let err = paginate_markup("<p>open</div>", &mut measurer, PaginateOptions::default())
        .err()
        .unwrap_or_else(|| panic!("expected markup error"));
    assert!(matches!(err, folio_paginate::PaginateError::Markup(_)));
}

#[test]
fn line_estimate_measurer_paginates_a_chapter() {
    let paragraph = "<p>It was a bright cold day in April, and the clocks were striking \
thirteen. Winston Smith slipped quickly through the glass doors.</p>";
    let markup = paragraph.repeat(12);
    let expected = text_of(&markup);

    let mut measurer = LineEstimateMeasurer::new(LineEstimateConfig::for_width(300.0));
    let opts = PaginateOptions::default().with_page_height(200.0);
    let pages: Vec<Page> = paginate_markup(&markup, &mut measurer, opts)
        .unwrap_or_else(|e| panic!("paginate: {}", e))
        .map(|page| page.unwrap_or_else(|e| panic!("page: {}", e)))
        .collect();

    assert!(pages.len() > 1, "expected several pages, got {}", pages.len());
    for page in &pages {
        assert!(page.height <= 200.0 || page.overflowed, "page {}", page.number);
    }
    let joined: String = pages.iter().map(|page| text_of(&page.markup)).collect();
    assert_eq!(joined, expected);
}

#[cfg(feature = "async")]
#[tokio::test]
async fn async_session_yields_between_pages() {
    let mut measurer = MeasureFn(char_count);
    let opts = PaginateOptions::default().with_page_height(3.0);
    let mut session = paginate_markup("<p>aa bb cc</p>", &mut measurer, opts)
        .unwrap_or_else(|e| panic!("paginate: {}", e));

    let mut markups = Vec::new();
    while let Some(page) = session.next_page_async().await {
        markups.push(page.unwrap_or_else(|e| panic!("page: {}", e)).markup);
    }
    assert_eq!(markups, ["<p>aa </p>", "<p>bb </p>", "<p>cc</p>"]);
}
