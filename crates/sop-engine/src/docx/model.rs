//! Typed view of a WordprocessingML body
//!
//! The body is lifted into paragraphs and tables; everything else is kept as
//! opaque [`XmlNode`]s in document order so it is written back untouched.

use super::error::DocxError;
use super::xml::{XmlElement, XmlNode};

/// Run-property children that must come after `w:sz` (CT_RPr sequence order)
const RPR_AFTER_SZ: &[&str] = &[
    "szCs",
    "highlight",
    "u",
    "effect",
    "bdr",
    "shd",
    "fitText",
    "vertAlign",
    "rtl",
    "cs",
    "em",
    "lang",
    "eastAsianLayout",
    "specVanish",
    "oMath",
    "rPrChange",
];

/// Paragraph children whose runs belong to the paragraph's text
const INLINE_CONTAINERS: &[&str] = &["hyperlink", "ins", "smartTag", "fldSimple", "customXml"];

/// Font size stored as half-points, the unit of `w:sz`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSize(u32);

impl FontSize {
    pub fn from_points(points: u32) -> Self {
        Self(points * 2)
    }

    pub fn half_points(&self) -> u32 {
        self.0
    }
}

/// Block-level content of a body or table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Other(XmlNode),
}

impl Block {
    fn from_node(node: XmlNode) -> Self {
        match node {
            XmlNode::Element(e) if e.is("p") => Block::Paragraph(Paragraph::from_element(e)),
            XmlNode::Element(e) if e.is("tbl") => Block::Table(Table::from_element(e)),
            other => Block::Other(other),
        }
    }

    fn into_node(self) -> XmlNode {
        match self {
            Block::Paragraph(p) => XmlNode::Element(p.into_element()),
            Block::Table(t) => XmlNode::Element(t.into_element()),
            Block::Other(node) => node,
        }
    }
}

/// A parsed `word/document.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: XmlElement,
    body_index: usize,
    body_shell: XmlElement,
    body: Vec<Block>,
}

impl Document {
    pub fn from_root(mut root: XmlElement) -> Result<Self, DocxError> {
        let body_index = root
            .children
            .iter()
            .position(|c| matches!(c, XmlNode::Element(e) if e.is("body")))
            .ok_or(DocxError::MissingBody)?;

        let XmlNode::Element(body) = root.children.remove(body_index) else {
            return Err(DocxError::MissingBody);
        };
        let body_shell = body.shell();
        let blocks = body.children.into_iter().map(Block::from_node).collect();

        Ok(Self {
            root,
            body_index,
            body_shell,
            body: blocks,
        })
    }

    pub fn into_root(self) -> XmlElement {
        let mut root = self.root;
        let mut body = self.body_shell;
        body.children = self.body.into_iter().map(Block::into_node).collect();
        root.children.insert(self.body_index, XmlNode::Element(body));
        root
    }

    pub fn body(&self) -> &[Block] {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Vec<Block> {
        &mut self.body
    }

    /// Every paragraph: top level, then inside table cells (recursively)
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs(&self.body, &mut out);
        out
    }

    pub fn paragraphs_mut(&mut self) -> Vec<&mut Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs_mut(&mut self.body, &mut out);
        out
    }

    /// Plain text of every paragraph, one per line
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn collect_paragraphs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Table(t) => {
                for cell in t.rows().flat_map(Row::cells) {
                    collect_paragraphs(&cell.blocks, out);
                }
            }
            Block::Other(_) => {}
        }
    }
}

fn collect_paragraphs_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Table(t) => {
                for cell in t.rows_mut().flat_map(Row::cells_mut) {
                    collect_paragraphs_mut(&mut cell.blocks, out);
                }
            }
            Block::Other(_) => {}
        }
    }
}

/// `w:p`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    shell: XmlElement,
    pub properties: Option<XmlElement>,
    pub content: Vec<Inline>,
}

/// Paragraph child: a run, a container of runs, or something opaque
/// (bookmarks, proofing marks, deletions)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Run(Run),
    Group(InlineGroup),
    Other(XmlNode),
}

impl Inline {
    fn from_node(node: XmlNode) -> Self {
        match node {
            XmlNode::Element(e) if e.is("r") => Inline::Run(Run::from_element(e)),
            XmlNode::Element(e) if INLINE_CONTAINERS.contains(&e.local_name()) => {
                Inline::Group(InlineGroup::from_element(e))
            }
            other => Inline::Other(other),
        }
    }

    fn into_node(self) -> XmlNode {
        match self {
            Inline::Run(r) => XmlNode::Element(r.into_element()),
            Inline::Group(g) => XmlNode::Element(g.into_element()),
            Inline::Other(node) => node,
        }
    }
}

/// `w:hyperlink`, `w:ins` and similar wrappers around runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineGroup {
    shell: XmlElement,
    pub content: Vec<Inline>,
}

impl InlineGroup {
    fn from_element(element: XmlElement) -> Self {
        let shell = element.shell();
        let content = element.children.into_iter().map(Inline::from_node).collect();
        Self { shell, content }
    }

    fn into_element(self) -> XmlElement {
        let mut element = self.shell;
        element.children = self.content.into_iter().map(Inline::into_node).collect();
        element
    }

    pub fn name(&self) -> &str {
        self.shell.local_name()
    }
}

fn collect_runs<'a>(content: &'a [Inline], out: &mut Vec<&'a Run>) {
    for inline in content {
        match inline {
            Inline::Run(r) => out.push(r),
            Inline::Group(g) => collect_runs(&g.content, out),
            Inline::Other(_) => {}
        }
    }
}

fn collect_runs_mut<'a>(content: &'a mut [Inline], out: &mut Vec<&'a mut Run>) {
    for inline in content {
        match inline {
            Inline::Run(r) => out.push(r),
            Inline::Group(g) => collect_runs_mut(&mut g.content, out),
            Inline::Other(_) => {}
        }
    }
}

impl Paragraph {
    fn from_element(element: XmlElement) -> Self {
        let shell = element.shell();
        let mut properties = None;
        let mut content = Vec::new();
        for child in element.children {
            match child {
                XmlNode::Element(e) if e.is("pPr") && properties.is_none() => properties = Some(e),
                other => content.push(Inline::from_node(other)),
            }
        }
        Self {
            shell,
            properties,
            content,
        }
    }

    fn into_element(self) -> XmlElement {
        let mut element = self.shell;
        element.children = self
            .properties
            .into_iter()
            .map(XmlNode::Element)
            .chain(self.content.into_iter().map(Inline::into_node))
            .collect();
        element
    }

    /// Every run in document order, including runs nested in hyperlinks,
    /// insertions and simple fields
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        let mut out = Vec::new();
        collect_runs(&self.content, &mut out);
        out.into_iter()
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        let mut out = Vec::new();
        collect_runs_mut(&mut self.content, &mut out);
        out.into_iter()
    }

    /// Text of all runs, concatenated across run boundaries
    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    /// Replace all inline content with one unformatted run holding `text`.
    ///
    /// Paragraph properties survive; run-level formatting does not.
    pub fn set_text(&mut self, text: &str) {
        self.content = vec![Inline::Run(Run::from_text(text))];
    }
}

/// `w:r`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    shell: XmlElement,
    pub properties: Option<XmlElement>,
    pub content: Vec<RunContent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunContent {
    Text(String),
    Tab,
    Break,
    CarriageReturn,
    Other(XmlNode),
}

impl Run {
    /// Unformatted run; `\t` becomes a tab, line endings become breaks
    pub fn from_text(text: &str) -> Self {
        let mut content = Vec::new();
        let mut buf = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            let special = match c {
                '\t' => Some(RunContent::Tab),
                '\n' => Some(RunContent::Break),
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    Some(RunContent::Break)
                }
                _ => None,
            };
            match special {
                Some(item) => {
                    if !buf.is_empty() {
                        content.push(RunContent::Text(std::mem::take(&mut buf)));
                    }
                    content.push(item);
                }
                None => buf.push(c),
            }
        }
        if !buf.is_empty() {
            content.push(RunContent::Text(buf));
        }

        Self {
            shell: XmlElement::new("w:r"),
            properties: None,
            content,
        }
    }

    fn from_element(element: XmlElement) -> Self {
        let shell = element.shell();
        let mut properties = None;
        let mut content = Vec::new();
        for child in element.children {
            match child {
                XmlNode::Element(e) if e.is("rPr") && properties.is_none() => properties = Some(e),
                XmlNode::Element(e) if e.is("t") => content.push(RunContent::Text(e.text())),
                XmlNode::Element(e) if e.is("tab") => content.push(RunContent::Tab),
                XmlNode::Element(e) if e.is("cr") => content.push(RunContent::CarriageReturn),
                XmlNode::Element(e)
                    if e.is("br") && matches!(e.attr("w:type"), None | Some("textWrapping")) =>
                {
                    content.push(RunContent::Break)
                }
                other => content.push(RunContent::Other(other)),
            }
        }
        Self {
            shell,
            properties,
            content,
        }
    }

    fn into_element(self) -> XmlElement {
        let mut element = self.shell;
        element.children = self
            .properties
            .into_iter()
            .map(XmlNode::Element)
            .chain(self.content.into_iter().map(|item| match item {
                RunContent::Text(text) => {
                    let mut t = XmlElement::new("w:t").with_attr("xml:space", "preserve");
                    if !text.is_empty() {
                        t.children.push(XmlNode::Text(text));
                    }
                    XmlNode::Element(t)
                }
                RunContent::Tab => XmlNode::Element(XmlElement::new("w:tab")),
                RunContent::Break => XmlNode::Element(XmlElement::new("w:br")),
                RunContent::CarriageReturn => XmlNode::Element(XmlElement::new("w:cr")),
                RunContent::Other(node) => node,
            }))
            .collect();
        element
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for item in &self.content {
            match item {
                RunContent::Text(t) => out.push_str(t),
                RunContent::Tab => out.push('\t'),
                RunContent::Break | RunContent::CarriageReturn => out.push('\n'),
                RunContent::Other(_) => {}
            }
        }
        out
    }

    /// Current `w:sz`, if the run sets one
    pub fn font_size(&self) -> Option<FontSize> {
        self.properties
            .as_ref()?
            .child("sz")?
            .attr("w:val")?
            .parse()
            .ok()
            .map(FontSize)
    }

    /// Set `w:sz`, creating `w:rPr` if needed and keeping schema order
    pub fn set_font_size(&mut self, size: FontSize) {
        let value = size.half_points().to_string();
        let props = self
            .properties
            .get_or_insert_with(|| XmlElement::new("w:rPr"));

        if let Some(sz) = props.child_mut("sz") {
            sz.set_attr("w:val", value);
            return;
        }

        let at = props
            .children
            .iter()
            .position(|c| matches!(c, XmlNode::Element(e) if RPR_AFTER_SZ.contains(&e.local_name())))
            .unwrap_or(props.children.len());
        props.children.insert(
            at,
            XmlNode::Element(XmlElement::new("w:sz").with_attr("w:val", value)),
        );
    }
}

/// `w:tbl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    shell: XmlElement,
    pub children: Vec<TableChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChild {
    Row(Row),
    Other(XmlNode),
}

impl Table {
    fn from_element(element: XmlElement) -> Self {
        let shell = element.shell();
        let children = element
            .children
            .into_iter()
            .map(|c| match c {
                XmlNode::Element(e) if e.is("tr") => TableChild::Row(Row::from_element(e)),
                other => TableChild::Other(other),
            })
            .collect();
        Self { shell, children }
    }

    fn into_element(self) -> XmlElement {
        let mut element = self.shell;
        element.children = self
            .children
            .into_iter()
            .map(|c| match c {
                TableChild::Row(r) => XmlNode::Element(r.into_element()),
                TableChild::Other(node) => node,
            })
            .collect();
        element
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.children.iter().filter_map(|c| match c {
            TableChild::Row(r) => Some(r),
            TableChild::Other(_) => None,
        })
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.children.iter_mut().filter_map(|c| match c {
            TableChild::Row(r) => Some(r),
            TableChild::Other(_) => None,
        })
    }
}

/// `w:tr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    shell: XmlElement,
    pub children: Vec<RowChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChild {
    Cell(Cell),
    Other(XmlNode),
}

impl Row {
    fn from_element(element: XmlElement) -> Self {
        let shell = element.shell();
        let children = element
            .children
            .into_iter()
            .map(|c| match c {
                XmlNode::Element(e) if e.is("tc") => RowChild::Cell(Cell::from_element(e)),
                other => RowChild::Other(other),
            })
            .collect();
        Self { shell, children }
    }

    fn into_element(self) -> XmlElement {
        let mut element = self.shell;
        element.children = self
            .children
            .into_iter()
            .map(|c| match c {
                RowChild::Cell(cell) => XmlNode::Element(cell.into_element()),
                RowChild::Other(node) => node,
            })
            .collect();
        element
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.children.iter().filter_map(|c| match c {
            RowChild::Cell(cell) => Some(cell),
            RowChild::Other(_) => None,
        })
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.children.iter_mut().filter_map(|c| match c {
            RowChild::Cell(cell) => Some(cell),
            RowChild::Other(_) => None,
        })
    }
}

/// `w:tc`; its `w:tcPr` is kept as an opaque block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    shell: XmlElement,
    pub blocks: Vec<Block>,
}

impl Cell {
    fn from_element(element: XmlElement) -> Self {
        let shell = element.shell();
        let blocks = element.children.into_iter().map(Block::from_node).collect();
        Self { shell, blocks }
    }

    fn into_element(self) -> XmlElement {
        let mut element = self.shell;
        element.children = self.blocks.into_iter().map(Block::into_node).collect();
        element
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    /// Text of the cell's own paragraphs, one per line
    pub fn text(&self) -> String {
        self.paragraphs()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml;
    use pretty_assertions::assert_eq;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn document(body: &str) -> Document {
        let source = format!("<w:document {W}><w:body>{body}<w:sectPr/></w:body></w:document>");
        Document::from_root(xml::parse(&source).unwrap()).unwrap()
    }

    #[test]
    fn test_paragraph_text_spans_runs() {
        let doc = document(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{{TIT</w:t></w:r><w:r><w:t>LE}}</w:t><w:tab/><w:t>x</w:t></w:r></w:p>"#,
        );
        assert_eq!(doc.paragraphs()[0].text(), "{{TITLE}}\tx");
    }

    #[test]
    fn test_runs_inside_hyperlinks_and_insertions_count_as_text() {
        let doc = document(
            r#"<w:p><w:r><w:t xml:space="preserve">See </w:t></w:r><w:hyperlink r:id="rId5"><w:r><w:t>{{TIT</w:t></w:r></w:hyperlink><w:ins w:id="1"><w:r><w:t>LE}}</w:t></w:r></w:ins><w:del w:id="2"><w:r><w:delText>gone</w:delText></w:r></w:del></w:p>"#,
        );
        let paragraph = doc.paragraphs()[0];
        assert_eq!(paragraph.text(), "See {{TITLE}}");
        assert_eq!(paragraph.runs().count(), 3);
        assert!(matches!(&paragraph.content[1], Inline::Group(g) if g.name() == "hyperlink"));
    }

    #[test]
    fn test_nested_runs_are_resized() {
        let mut doc = document(
            r#"<w:p><w:fldSimple w:instr="PAGE"><w:r><w:t>1</w:t></w:r></w:fldSimple></w:p>"#,
        );
        for run in doc.paragraphs_mut().remove(0).runs_mut() {
            run.set_font_size(FontSize::from_points(8));
        }
        let again = Document::from_root(doc.into_root()).unwrap();
        let run = again.paragraphs()[0].runs().next().unwrap();
        assert_eq!(run.font_size(), Some(FontSize::from_points(8)));
        assert!(matches!(&again.paragraphs()[0].content[0], Inline::Group(g) if g.name() == "fldSimple"));
    }

    #[test]
    fn test_set_text_collapses_runs_and_keeps_paragraph_properties() {
        let mut doc = document(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:bookmarkStart w:id="0"/><w:r><w:t>a</w:t></w:r><w:r><w:t>b</w:t></w:r></w:p>"#,
        );
        let paragraph = doc.paragraphs_mut().remove(0);
        paragraph.set_text("line one\nline two");

        assert!(paragraph.properties.is_some());
        assert_eq!(paragraph.content.len(), 1);
        assert_eq!(paragraph.runs().count(), 1);
        assert_eq!(paragraph.text(), "line one\nline two");
        assert!(paragraph.runs().all(|r| r.properties.is_none()));
    }

    #[test]
    fn test_crlf_becomes_single_break() {
        let run = Run::from_text("a\r\nb");
        assert_eq!(
            run.content,
            vec![
                RunContent::Text("a".to_string()),
                RunContent::Break,
                RunContent::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_table_cell_paragraphs_are_visited() {
        let doc = document(
            r#"<w:p><w:r><w:t>top</w:t></w:r></w:p>
<w:tbl><w:tblPr/><w:tblGrid/><w:tr><w:tc><w:tcPr/><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        );
        let texts: Vec<_> = doc.paragraphs().iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["top", "cell"]);
    }

    #[test]
    fn test_set_font_size_inserts_in_schema_order() {
        let mut run = Run::from_element(
            xml::parse(r#"<w:r><w:rPr><w:b/><w:lang w:val="en-US"/></w:rPr><w:t>x</w:t></w:r>"#)
                .unwrap(),
        );
        run.set_font_size(FontSize::from_points(8));

        let names: Vec<_> = run
            .properties
            .as_ref()
            .unwrap()
            .elements()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["w:b", "w:sz", "w:lang"]);
        assert_eq!(run.font_size(), Some(FontSize::from_points(8)));
    }

    #[test]
    fn test_set_font_size_overrides_existing() {
        let mut run = Run::from_element(
            xml::parse(r#"<w:r><w:rPr><w:sz w:val="28"/></w:rPr><w:t>x</w:t></w:r>"#).unwrap(),
        );
        run.set_font_size(FontSize::from_points(8));
        assert_eq!(run.font_size().map(|s| s.half_points()), Some(16));
    }

    #[test]
    fn test_round_trip_is_lossless_for_untouched_content() {
        let doc = document(
            r#"<w:p w:rsidR="1"><w:pPr/><w:r><w:t xml:space="preserve">a </w:t></w:r><w:proofErr/></w:p><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
        );
        let again = Document::from_root(doc.clone().into_root()).unwrap();
        assert_eq!(again, doc);
        assert_eq!(again.text(), "a \n");
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let root = xml::parse(&format!("<w:document {W}/>")).unwrap();
        assert!(matches!(
            Document::from_root(root),
            Err(DocxError::MissingBody)
        ));
    }
}
