use core::fmt;

use folio::{break_units, Document, NodeId, NodeKind};

/// Height oracle for the page tree.
///
/// Implementations render (or estimate) the subtree under `page` and report
/// its height in the same units as the configured page budget. Heights are
/// expected to grow with content; the engine only compares them against the
/// budget.
pub trait Measure {
    /// Height of the page tree rooted at `page`.
    fn measure(&mut self, doc: &Document, page: NodeId) -> Result<f32, MeasureError>;

    /// Apply identifying classes to the measurement surface. Called once per
    /// session before the first measurement.
    fn attach_classes(&mut self, _classes: &[String]) {}

    /// Height of the surrounding container, used when no explicit page height
    /// is configured.
    fn container_height(&self) -> Option<f32> {
        None
    }
}

impl<M: Measure + ?Sized> Measure for &mut M {
    fn measure(&mut self, doc: &Document, page: NodeId) -> Result<f32, MeasureError> {
        (**self).measure(doc, page)
    }

    fn attach_classes(&mut self, classes: &[String]) {
        (**self).attach_classes(classes)
    }

    fn container_height(&self) -> Option<f32> {
        (**self).container_height()
    }
}

/// The measurement surface failed to produce a height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasureError {
    message: Box<str>,
}

impl MeasureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into_boxed_str(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "measurement failed: {}", self.message)
    }
}

impl std::error::Error for MeasureError {}

/// Adapter turning a closure into a [`Measure`] implementation.
pub struct MeasureFn<F>(pub F);

impl<F> Measure for MeasureFn<F>
where
    F: FnMut(&Document, NodeId) -> Result<f32, MeasureError>,
{
    fn measure(&mut self, doc: &Document, page: NodeId) -> Result<f32, MeasureError> {
        (self.0)(doc, page)
    }
}

impl<F> fmt::Debug for MeasureFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasureFn").finish_non_exhaustive()
    }
}

/// Reports the number of top-level nodes on the page as its height.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChildCountMeasurer;

impl Measure for ChildCountMeasurer {
    fn measure(&mut self, doc: &Document, page: NodeId) -> Result<f32, MeasureError> {
        Ok(doc.children(page).count() as f32)
    }
}

/// Geometry used by [`LineEstimateMeasurer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineEstimateConfig {
    /// Usable line width.
    pub content_width_px: f32,
    /// Body font size; glyph advances scale with it.
    pub font_size_px: f32,
    /// Height of one text line.
    pub line_height_px: f32,
    /// Vertical gap after each block element.
    pub block_gap_px: f32,
    /// Height used for images without a `height` attribute.
    pub image_height_px: f32,
    /// Use a single advance for every glyph instead of per-class widths.
    pub monospace: bool,
}

impl Default for LineEstimateConfig {
    fn default() -> Self {
        Self {
            content_width_px: 416.0,
            font_size_px: 16.0,
            line_height_px: 22.0,
            block_gap_px: 8.0,
            image_height_px: 120.0,
            monospace: false,
        }
    }
}

impl LineEstimateConfig {
    /// Convenience for a content box size with default typography.
    pub fn for_width(content_width_px: f32) -> Self {
        Self {
            content_width_px,
            ..Self::default()
        }
    }
}

/// Surface-free measurer that estimates wrapped text height.
///
/// Text is wrapped at break units with a glyph-class width model; block
/// elements start a new line and add a trailing gap; `br` forces a line
/// break; `img` occupies its `height` attribute or a default height.
#[derive(Clone, Debug, Default)]
pub struct LineEstimateMeasurer {
    cfg: LineEstimateConfig,
    container_height: Option<f32>,
    classes: Vec<String>,
}

impl LineEstimateMeasurer {
    pub fn new(cfg: LineEstimateConfig) -> Self {
        Self {
            cfg,
            container_height: None,
            classes: Vec::new(),
        }
    }

    /// Report `height` as the container height for sessions without an
    /// explicit page height.
    pub fn with_container_height(mut self, height: f32) -> Self {
        self.container_height = Some(height);
        self
    }

    pub fn config(&self) -> LineEstimateConfig {
        self.cfg
    }

    /// Classes attached by the last session.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn text_width(&self, text: &str) -> f32 {
        let em_sum: f32 = if self.cfg.monospace {
            text.chars().count() as f32 * 0.5
        } else {
            text.chars().map(proportional_glyph_em_width).sum()
        };
        em_sum * self.cfg.font_size_px
    }

    fn flow_node(&self, doc: &Document, node: NodeId, flow: &mut Flow) {
        match doc.kind(node) {
            Some(NodeKind::Fragment) => {
                for child in doc.children(node) {
                    self.flow_node(doc, child, flow);
                }
            }
            Some(NodeKind::Text(text)) => {
                let mut start = 0usize;
                for end in break_units(text) {
                    let unit = &text[start..end];
                    start = end;
                    if unit.contains('\n') && flow.preformatted > 0 {
                        flow.place_inline(self.text_width(unit.trim_end_matches('\n')), &self.cfg);
                        flow.break_line(&self.cfg);
                        continue;
                    }
                    flow.place_inline(self.text_width(unit), &self.cfg);
                }
            }
            Some(NodeKind::Element(el)) => match el.tag.as_str() {
                "br" => {
                    flow.line_open = true;
                    flow.break_line(&self.cfg);
                }
                "img" | "svg" | "video" | "canvas" => {
                    flow.break_line(&self.cfg);
                    let height = el
                        .attr("height")
                        .and_then(parse_px)
                        .unwrap_or(self.cfg.image_height_px);
                    flow.height += height;
                }
                "hr" => {
                    flow.break_line(&self.cfg);
                    flow.height += self.cfg.block_gap_px;
                }
                tag if is_block_tag(tag) => {
                    flow.break_line(&self.cfg);
                    let pre = tag == "pre";
                    if pre {
                        flow.preformatted += 1;
                    }
                    for child in doc.children(node) {
                        self.flow_node(doc, child, flow);
                    }
                    if pre {
                        flow.preformatted -= 1;
                    }
                    flow.break_line(&self.cfg);
                    flow.height += self.cfg.block_gap_px;
                }
                _ => {
                    for child in doc.children(node) {
                        self.flow_node(doc, child, flow);
                    }
                }
            },
            None => {}
        }
    }
}

impl Measure for LineEstimateMeasurer {
    fn measure(&mut self, doc: &Document, page: NodeId) -> Result<f32, MeasureError> {
        if self.cfg.content_width_px <= 0.0 || !self.cfg.content_width_px.is_finite() {
            return Err(MeasureError::new(format!(
                "content width must be positive, got {}",
                self.cfg.content_width_px
            )));
        }
        let mut flow = Flow::default();
        self.flow_node(doc, page, &mut flow);
        flow.break_line(&self.cfg);
        Ok(flow.height)
    }

    fn attach_classes(&mut self, classes: &[String]) {
        self.classes = classes.to_vec();
    }

    fn container_height(&self) -> Option<f32> {
        self.container_height
    }
}

#[derive(Default)]
struct Flow {
    height: f32,
    line_width: f32,
    line_open: bool,
    preformatted: usize,
}

impl Flow {
    fn break_line(&mut self, cfg: &LineEstimateConfig) {
        if !self.line_open {
            return;
        }
        self.height += cfg.line_height_px;
        self.line_width = 0.0;
        self.line_open = false;
    }

    fn place_inline(&mut self, width: f32, cfg: &LineEstimateConfig) {
        if width <= 0.0 {
            return;
        }
        if self.line_open && self.line_width + width > cfg.content_width_px {
            self.break_line(cfg);
        }
        let mut width = width;
        // An unbreakable unit wider than the line spills over whole lines.
        while width > cfg.content_width_px {
            self.height += cfg.line_height_px;
            width -= cfg.content_width_px;
        }
        self.line_width += width;
        self.line_open = true;
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "article"
            | "aside"
            | "header"
            | "footer"
            | "nav"
            | "main"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "li"
            | "dl"
            | "dt"
            | "dd"
            | "figure"
            | "figcaption"
            | "table"
            | "tr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

fn parse_px(raw: &str) -> Option<f32> {
    let value = raw.trim().trim_end_matches("px").trim();
    value.parse::<f32>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' | '\u{00A0}' => 0.32,
        '\t' => 1.28,
        '\n' | '\r' | '\u{00AD}' | '\u{200B}' => 0.0,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.23,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => 0.34,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.30,
        'f' | 't' | 'j' | 'r' => 0.34,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.74,
        c if c.is_ascii_digit() => 0.52,
        c if c.is_ascii_uppercase() => 0.64,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.32,
        c if c.is_ascii_punctuation() => 0.42,
        _ => 0.56,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio::parse_fragment;

    fn mono(width_chars: f32) -> LineEstimateMeasurer {
        LineEstimateMeasurer::new(LineEstimateConfig {
            content_width_px: width_chars * 8.0,
            font_size_px: 16.0,
            line_height_px: 10.0,
            block_gap_px: 0.0,
            image_height_px: 50.0,
            monospace: true,
        })
    }

    fn height_of(measurer: &mut LineEstimateMeasurer, markup: &str) -> f32 {
        let mut doc = Document::new();
        let root = parse_fragment(&mut doc, markup).expect("parse");
        measurer.measure(&doc, root).expect("measure")
    }

    #[test]
    fn empty_page_has_zero_height() {
        assert_eq!(height_of(&mut mono(10.0), ""), 0.0);
        assert_eq!(height_of(&mut mono(10.0), "<p></p>"), 0.0);
    }

    #[test]
    fn text_wraps_at_break_units() {
        let mut m = mono(10.0);
        assert_eq!(height_of(&mut m, "<p>aaaa bbbb</p>"), 10.0);
        assert_eq!(height_of(&mut m, "<p>aaaa bbbb cccc</p>"), 20.0);
    }

    #[test]
    fn blocks_start_new_lines_and_br_breaks() {
        let mut m = mono(20.0);
        assert_eq!(height_of(&mut m, "<p>a</p><p>b</p>"), 20.0);
        assert_eq!(height_of(&mut m, "<p>a<br/>b</p>"), 20.0);
        assert_eq!(height_of(&mut m, "<p>a <b>b</b> c</p>"), 10.0);
    }

    #[test]
    fn long_word_spills_over_lines() {
        let mut m = mono(4.0);
        assert_eq!(height_of(&mut m, "<p>abcdefghij</p>"), 30.0);
    }

    #[test]
    fn images_use_height_attribute_or_default() {
        let mut m = mono(20.0);
        assert_eq!(height_of(&mut m, "<img src=\"a.png\"/>"), 50.0);
        assert_eq!(height_of(&mut m, "<img src=\"a.png\" height=\"33px\"/>"), 33.0);
    }

    #[test]
    fn block_gap_is_added_after_blocks() {
        let mut m = LineEstimateMeasurer::new(LineEstimateConfig {
            block_gap_px: 5.0,
            line_height_px: 10.0,
            monospace: true,
            ..LineEstimateConfig::default()
        });
        assert_eq!(height_of(&mut m, "<p>a</p><p>b</p>"), 30.0);
    }

    #[test]
    fn invalid_width_is_a_measure_error() {
        let mut m = LineEstimateMeasurer::new(LineEstimateConfig::for_width(0.0));
        let mut doc = Document::new();
        let root = parse_fragment(&mut doc, "<p>x</p>").expect("parse");
        let err = m.measure(&doc, root).expect_err("zero width");
        assert!(err.message().contains("content width"));
    }

    #[test]
    fn child_count_counts_top_level_nodes() {
        let mut doc = Document::new();
        let root = parse_fragment(&mut doc, "<p>a</p><p>b<i>c</i></p>").expect("parse");
        assert_eq!(ChildCountMeasurer.measure(&doc, root).expect("measure"), 2.0);
    }
}
